//! Model error types.

use thiserror::Error;

use crate::job_status::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("invalid render options: {0}")]
    InvalidOptions(String),

    #[error("invalid job message: {0}")]
    InvalidMessage(String),
}

impl ModelError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    pub fn invalid_message(msg: impl Into<String>) -> Self {
        Self::InvalidMessage(msg.into())
    }
}
