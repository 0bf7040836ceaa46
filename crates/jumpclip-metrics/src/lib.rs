//! Jump physics and session statistics.
//!
//! Everything in this crate is pure: timestamps in, numbers out.
//! - Flight time, jump height and takeoff velocity from takeoff/landing marks
//! - Session aggregates (best, mean, population deviation, fatigue slope)
//! - Overlay caption formatting for rendered clips

pub mod error;
pub mod jump;
pub mod overlay;
pub mod session;

pub use error::{MetricsError, MetricsResult};
pub use jump::{
    compute_jump_metrics, flight_time_s, height_from_flight_time, takeoff_velocity, JumpMetrics, G,
};
pub use overlay::format_overlay_text;
pub use session::{fatigue_slope, mean, population_std_dev, SessionStats};
