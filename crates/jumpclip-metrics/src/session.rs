//! Session-level statistics over jump heights.

use serde::{Deserialize, Serialize};

/// Aggregate statistics for a session of jumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub count: usize,
    pub best: f64,
    pub average: f64,
    /// Population standard deviation (divides by n).
    pub standard_deviation: f64,
    /// `None` when the average is zero.
    pub coefficient_of_variation: Option<f64>,
    /// Least-squares slope of height against 1-based attempt index.
    pub fatigue_slope: f64,
}

impl SessionStats {
    /// Aggregate a list of heights in attempt order.
    pub fn from_heights(heights: &[f64]) -> Self {
        let average = mean(heights);
        let standard_deviation = population_std_dev(heights);
        let best = heights.iter().copied().fold(None, |best: Option<f64>, h| {
            Some(best.map_or(h, |b| b.max(h)))
        });

        Self {
            count: heights.len(),
            best: best.unwrap_or(0.0),
            average,
            standard_deviation,
            coefficient_of_variation: (average != 0.0).then(|| standard_deviation / average),
            fatigue_slope: fatigue_slope(heights),
        }
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linear regression slope of `values` against x = 1..=n.
///
/// Returns 0 for fewer than two points.
pub fn fatigue_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = (i + 1) as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n_f * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_std_dev_known_value() {
        let sd = population_std_dev(&[1.0, 2.0, 3.0, 4.0]);
        assert!((sd - 1.1180).abs() < 1e-4);
    }

    #[test]
    fn test_cv_null_when_average_zero() {
        let stats = SessionStats::from_heights(&[0.0, 0.0, 0.0]);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.coefficient_of_variation, None);

        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["coefficientOfVariation"].is_null());
    }

    #[test]
    fn test_fatigue_slope_short_inputs() {
        assert_eq!(fatigue_slope(&[]), 0.0);
        assert_eq!(fatigue_slope(&[0.42]), 0.0);
    }

    #[test]
    fn test_fatigue_slope_sign() {
        assert!(fatigue_slope(&[0.30, 0.32, 0.35, 0.41]) > 0.0);
        assert!(fatigue_slope(&[0.41, 0.35, 0.32, 0.30]) < 0.0);
        assert_eq!(fatigue_slope(&[0.3, 0.3, 0.3]), 0.0);
    }

    #[test]
    fn test_fatigue_slope_exact_line() {
        let slope = fatigue_slope(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_session_is_zero_valued() {
        let stats = SessionStats::from_heights(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.best, 0.0);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.standard_deviation, 0.0);
        assert_eq!(stats.coefficient_of_variation, None);
        assert_eq!(stats.fatigue_slope, 0.0);
    }

    #[test]
    fn test_session_aggregate() {
        let stats = SessionStats::from_heights(&[0.2, 0.4]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.best, 0.4);
        assert!((stats.average - 0.3).abs() < 1e-12);
        assert!((stats.standard_deviation - 0.1).abs() < 1e-12);
        let cv = stats.coefficient_of_variation.unwrap();
        assert!((cv - 1.0 / 3.0).abs() < 1e-9);
    }
}
