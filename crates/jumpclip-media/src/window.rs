//! Time window of a clip around a jump.

/// Shortest window handed to FFmpeg.
pub const MIN_WINDOW_MS: f64 = 50.0;

/// Lead-in and lead-out around takeoff and landing.
pub const DEFAULT_PAD_MS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl ClipWindow {
    /// `[takeoff - pad, landing + pad]`, starting no earlier than 0.
    pub fn around_jump(takeoff_ms: f64, landing_ms: f64, pad_ms: f64) -> Self {
        let start_ms = (takeoff_ms - pad_ms).max(0.0);
        let end_ms = (landing_ms + pad_ms).max(start_ms + MIN_WINDOW_MS);
        Self { start_ms, end_ms }
    }

    /// Clamp to `[0, duration]` when the duration is known, keeping at least
    /// [`MIN_WINDOW_MS`].
    pub fn clamped(self, duration_ms: Option<f64>) -> Self {
        let mut start_ms = self.start_ms.max(0.0);
        let mut end_ms = self.end_ms;

        if let Some(duration) = duration_ms.filter(|d| d.is_finite() && *d > 0.0) {
            start_ms = start_ms.min((duration - MIN_WINDOW_MS).max(0.0));
            end_ms = end_ms.min(duration).max(MIN_WINDOW_MS);
        }

        Self {
            start_ms,
            end_ms: end_ms.max(start_ms + MIN_WINDOW_MS),
        }
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms / 1000.0
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_around_jump_pads() {
        let w = ClipWindow::around_jump(1000.0, 1500.0, DEFAULT_PAD_MS);
        assert_eq!(w, ClipWindow { start_ms: 700.0, end_ms: 1800.0 });
    }

    #[test]
    fn test_around_jump_near_start() {
        let w = ClipWindow::around_jump(100.0, 200.0, DEFAULT_PAD_MS);
        assert_eq!(w.start_ms, 0.0);
        assert_eq!(w.end_ms, 500.0);
    }

    #[test]
    fn test_inverted_marks_keep_minimum() {
        let w = ClipWindow::around_jump(2000.0, 1000.0, 0.0);
        assert_eq!(w.start_ms, 2000.0);
        assert_eq!(w.duration_ms(), MIN_WINDOW_MS);
    }

    #[test]
    fn test_clamped_to_duration() {
        let w = ClipWindow::around_jump(9800.0, 10_200.0, DEFAULT_PAD_MS).clamped(Some(10_000.0));
        assert_eq!(w, ClipWindow { start_ms: 9500.0, end_ms: 10_000.0 });
    }

    #[test]
    fn test_window_past_end_stays_inside() {
        let w = ClipWindow { start_ms: 20_000.0, end_ms: 21_000.0 }.clamped(Some(10_000.0));
        assert_eq!(w, ClipWindow { start_ms: 9950.0, end_ms: 10_000.0 });
    }

    #[test]
    fn test_unknown_duration_leaves_window() {
        let w = ClipWindow { start_ms: 700.0, end_ms: 1800.0 };
        assert_eq!(w.clamped(None), w);
        assert_eq!(w.clamped(Some(f64::NAN)), w);
    }

    #[test]
    fn test_seconds() {
        let w = ClipWindow { start_ms: 700.0, end_ms: 1800.0 };
        assert_eq!(w.start_secs(), 0.7);
        assert_eq!(w.end_secs(), 1.8);
    }
}
