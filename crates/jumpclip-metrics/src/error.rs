//! Metrics error types.

use thiserror::Error;

/// Result type for metrics computations.
pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    #[error("invalid {field} timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: f64 },
}

impl MetricsError {
    pub fn invalid_timestamp(field: &'static str, value: f64) -> Self {
        Self::InvalidTimestamp { field, value }
    }
}
