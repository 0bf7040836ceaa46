//! Caption text burned into rendered clips.

use crate::jump::JumpMetrics;

/// Caption for the `index`-th jump (1-based).
pub fn format_overlay_text(index: usize, metrics: &JumpMetrics) -> String {
    let cm = (metrics.height_m * 100.0).round();
    let ms = (metrics.flight_time_s * 1000.0).round();
    format!(
        "Jump {}  |  {} cm  |  {} ms  |  {:.1} m/s",
        index, cm, ms, metrics.takeoff_velocity_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jump::compute_jump_metrics;

    #[test]
    fn test_overlay_text() {
        let m = compute_jump_metrics(1000.0, 1500.0).unwrap();
        assert_eq!(
            format_overlay_text(1, &m),
            "Jump 1  |  31 cm  |  500 ms  |  2.5 m/s"
        );
    }

    #[test]
    fn test_overlay_text_zero_flight() {
        let m = compute_jump_metrics(10.0, 10.0).unwrap();
        assert_eq!(format_overlay_text(3, &m), "Jump 3  |  0 cm  |  0 ms  |  0.0 m/s");
    }
}
