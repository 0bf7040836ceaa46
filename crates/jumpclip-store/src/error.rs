//! Store error types.

use jumpclip_models::{JobStatus, ModelError};
use thiserror::Error;

use crate::firestore::FirestoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Job {job_id} is {status} and only diagnostic fields may change")]
    Immutable { job_id: String, status: JobStatus },

    #[error("Outputs of job {0} may only be appended to while it is running")]
    OutputsRewritten(String),

    #[error(transparent)]
    Transition(#[from] ModelError),

    #[error("Concurrent modification of {0}")]
    Conflict(String),

    #[error("Failed to decode {collection}/{id}: {message}")]
    Decode {
        collection: String,
        id: String,
        message: String,
    },

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),
}

impl StoreError {
    pub fn decode(collection: &str, id: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            collection: collection.to_string(),
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Firestore(e) => e.is_retryable(),
            _ => false,
        }
    }
}
