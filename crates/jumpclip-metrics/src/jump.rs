//! Per-jump physics.
//!
//! Uses the flight-time method: a body leaving and landing at the same
//! height spends half the flight rising, so `h = g·t²/8` and `v = g·t/2`.

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, MetricsResult};

/// Gravitational acceleration in m/s².
pub const G: f64 = 9.81;

/// Physical quantities derived from one jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpMetrics {
    /// Time in the air, seconds.
    pub flight_time_s: f64,
    /// Jump height, metres.
    pub height_m: f64,
    /// Vertical takeoff velocity, m/s.
    pub takeoff_velocity_ms: f64,
}

/// Flight time in seconds. Landing before takeoff clamps to zero.
pub fn flight_time_s(takeoff_ms: f64, landing_ms: f64) -> MetricsResult<f64> {
    if !takeoff_ms.is_finite() {
        return Err(MetricsError::invalid_timestamp("takeoff", takeoff_ms));
    }
    if !landing_ms.is_finite() {
        return Err(MetricsError::invalid_timestamp("landing", landing_ms));
    }
    Ok((landing_ms - takeoff_ms).max(0.0) / 1000.0)
}

pub fn height_from_flight_time(t: f64) -> f64 {
    G * t * t / 8.0
}

pub fn takeoff_velocity(t: f64) -> f64 {
    G * t / 2.0
}

/// Compute all per-jump metrics from takeoff and landing marks in milliseconds.
pub fn compute_jump_metrics(takeoff_ms: f64, landing_ms: f64) -> MetricsResult<JumpMetrics> {
    let t = flight_time_s(takeoff_ms, landing_ms)?;
    Ok(JumpMetrics {
        flight_time_s: t,
        height_m: height_from_flight_time(t),
        takeoff_velocity_ms: takeoff_velocity(t),
    })
}
