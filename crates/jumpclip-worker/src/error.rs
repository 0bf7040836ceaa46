//! Worker error types.

use std::error::Error as _;
use std::path::PathBuf;

use jumpclip_media::{MediaError, StderrTail};
use jumpclip_metrics::MetricsError;
use jumpclip_models::{ModelError, TargetKind};
use jumpclip_queue::QueueError;
use jumpclip_storage::StorageError;
use jumpclip_store::StoreError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{kind} {id} not found")]
    TargetNotFound { kind: TargetKind, id: String },

    #[error("Video {0} not found")]
    VideoMissing(String),

    #[error("Video {0} has neither a storage key nor a local path")]
    NoVideoSource(String),

    #[error("Source file {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid jump: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Invalid job: {0}")]
    Model(#[from] ModelError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure category, used for logs and the outcome metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Bad or missing input records; retrying will not help
    Input,
    /// Store, blob or queue trouble
    Infrastructure,
    /// The transcoder failed
    Subprocess,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Input => "input",
            FailureClass::Infrastructure => "infrastructure",
            FailureClass::Subprocess => "subprocess",
        }
    }
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn target_not_found(kind: TargetKind, id: impl Into<String>) -> Self {
        Self::TargetNotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            WorkerError::TargetNotFound { .. }
            | WorkerError::VideoMissing(_)
            | WorkerError::NoVideoSource(_)
            | WorkerError::SourceMissing(_)
            | WorkerError::Metrics(_)
            | WorkerError::Model(_)
            | WorkerError::Storage(StorageError::NotFound(_))
            | WorkerError::Media(MediaError::FileNotFound(_)) => FailureClass::Input,
            WorkerError::Media(e) if e.is_subprocess_failure() => FailureClass::Subprocess,
            _ => FailureClass::Infrastructure,
        }
    }

    /// Text for the job's `stderrTail`: the transcoder's own output when there
    /// is some, otherwise the error and its causes. Bounded like a stderr tail.
    pub fn diagnostic(&self) -> String {
        if let WorkerError::Media(e) = self {
            if let Some(tail) = e.stderr_tail() {
                return StderrTail::bounded(tail, StderrTail::DEFAULT_CAPACITY);
            }
        }

        let mut text = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            let cause_text = cause.to_string();
            if !text.contains(&cause_text) {
                text.push_str("\ncaused by: ");
                text.push_str(&cause_text);
            }
            source = cause.source();
        }
        StderrTail::bounded(&text, StderrTail::DEFAULT_CAPACITY)
    }
}
