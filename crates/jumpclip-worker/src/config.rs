//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jumpclip_media::DEFAULT_PAD_MS;

use crate::error::{WorkerError, WorkerResult};

/// Where queue messages come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Redis,
    /// Poll the job store for queued jobs
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local; jobs do not survive a restart
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    S3,
    Local,
}

macro_rules! parse_backend {
    ($ty:ty, $var:literal, { $($name:literal => $value:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = WorkerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($value),)+
                    other => Err(WorkerError::config_error(format!(
                        "{} must be one of [{}], got '{}'",
                        $var,
                        [$($name),+].join(", "),
                        other
                    ))),
                }
            }
        }
    };
}

parse_backend!(QueueBackend, "JUMPCLIP_QUEUE_BACKEND", {
    "redis" => QueueBackend::Redis,
    "store" => QueueBackend::Store,
});
parse_backend!(StoreBackend, "JUMPCLIP_STORE_BACKEND", {
    "firestore" => StoreBackend::Firestore,
    "memory" => StoreBackend::Memory,
});
parse_backend!(BlobBackend, "JUMPCLIP_BLOB_BACKEND", {
    "s3" => BlobBackend::S3,
    "local" => BlobBackend::Local,
});

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the per-job staging directories
    pub work_dir: PathBuf,
    pub queue_backend: QueueBackend,
    pub store_backend: StoreBackend,
    pub blob_backend: BlobBackend,
    /// Root directory for the `local` blob backend
    pub local_blob_root: PathBuf,
    /// Longest single queue receive
    pub receive_wait: Duration,
    /// Lead-in and lead-out around each jump
    pub clip_pad_ms: f64,
    /// Extra attempts for the final job write
    pub finalize_retries: u32,
    /// Prometheus listener port; unset disables the listener
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/jumpclip"),
            queue_backend: QueueBackend::Redis,
            store_backend: StoreBackend::Firestore,
            blob_backend: BlobBackend::S3,
            local_blob_root: PathBuf::from("/tmp/jumpclip-blobs"),
            receive_wait: Duration::from_secs(20),
            clip_pad_ms: DEFAULT_PAD_MS,
            finalize_retries: 3,
            metrics_port: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_backend<T: FromStr<Err = WorkerError>>(key: &str, default: T) -> WorkerResult<T> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.parse(),
        _ => Ok(default),
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unparsable numbers fall back to defaults; unknown backend names are errors.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            work_dir: std::env::var("JUMPCLIP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            queue_backend: env_backend("JUMPCLIP_QUEUE_BACKEND", defaults.queue_backend)?,
            store_backend: env_backend("JUMPCLIP_STORE_BACKEND", defaults.store_backend)?,
            blob_backend: env_backend("JUMPCLIP_BLOB_BACKEND", defaults.blob_backend)?,
            local_blob_root: std::env::var("JUMPCLIP_LOCAL_BLOB_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_blob_root),
            receive_wait: env_parse("JUMPCLIP_RECEIVE_WAIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.receive_wait),
            clip_pad_ms: env_parse::<f64>("JUMPCLIP_CLIP_PAD_MS")
                .filter(|p| p.is_finite() && *p >= 0.0)
                .unwrap_or(defaults.clip_pad_ms),
            finalize_retries: env_parse("JUMPCLIP_FINALIZE_RETRIES")
                .unwrap_or(defaults.finalize_retries),
            metrics_port: env_parse("METRICS_PORT"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "JUMPCLIP_WORK_DIR",
        "JUMPCLIP_QUEUE_BACKEND",
        "JUMPCLIP_STORE_BACKEND",
        "JUMPCLIP_BLOB_BACKEND",
        "JUMPCLIP_RECEIVE_WAIT_SECS",
        "JUMPCLIP_CLIP_PAD_MS",
        "METRICS_PORT",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/jumpclip"));
        assert_eq!(config.queue_backend, QueueBackend::Redis);
        assert_eq!(config.receive_wait, Duration::from_secs(20));
        assert_eq!(config.clip_pad_ms, 300.0);
        assert_eq!(config.finalize_retries, 3);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        std::env::set_var("JUMPCLIP_QUEUE_BACKEND", "Store");
        std::env::set_var("JUMPCLIP_STORE_BACKEND", "memory");
        std::env::set_var("JUMPCLIP_CLIP_PAD_MS", "-5");
        std::env::set_var("METRICS_PORT", "9100");
        let config = WorkerConfig::from_env().unwrap();
        clear();

        assert_eq!(config.queue_backend, QueueBackend::Store);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.clip_pad_ms, 300.0);
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    #[serial]
    fn test_unknown_backend_rejected() {
        clear();
        std::env::set_var("JUMPCLIP_BLOB_BACKEND", "gcs");
        let result = WorkerConfig::from_env();
        clear();
        assert!(matches!(result, Err(WorkerError::ConfigError(_))));
    }
}
