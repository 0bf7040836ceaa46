//! Firestore error types.

use thiserror::Error;

pub type FirestoreResult<T> = Result<T, FirestoreError>;

#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            412 => Self::PreconditionFailed(message),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// HTTP status this error corresponds to, where one is known.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::PreconditionFailed(_) => Some(412),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(status, _) => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::RequestFailed(_) | Self::Json(_) => None,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited(_) | Self::ServerError(..)
        )
    }

    /// The write lost an optimistic-concurrency race.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            FirestoreError::from_http_status(429, "slow down"),
            FirestoreError::RateLimited(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(503, "unavailable"),
            FirestoreError::ServerError(503, _)
        ));
        assert!(FirestoreError::from_http_status(412, "stale").is_precondition_failed());
        assert!(matches!(
            FirestoreError::from_http_status(400, "bad"),
            FirestoreError::RequestFailed(_)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(FirestoreError::from_http_status(500, "x").is_retryable());
        assert!(FirestoreError::RateLimited(10).is_retryable());
        assert!(!FirestoreError::from_http_status(404, "x").is_retryable());
        assert!(!FirestoreError::from_http_status(412, "x").is_retryable());
    }

    #[test]
    fn test_http_status_and_retry_after() {
        assert_eq!(FirestoreError::RateLimited(5000).http_status(), Some(429));
        assert_eq!(FirestoreError::RateLimited(5000).retry_after_ms(), Some(5000));
        assert_eq!(
            FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
            Some(502)
        );
        assert_eq!(FirestoreError::NotFound("doc".into()).retry_after_ms(), None);
    }
}
