//! Queue-driven jump clip worker.
//!
//! This crate provides:
//! - [`JobConsumer`]: receive, claim, run, ack or abandon
//! - [`JobRunner`]: renders every jump of a claimed job and finalizes it
//! - Source staging and clip publication with guaranteed cleanup
//! - A store-polling queue for deployments without a transport

pub mod cancel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod publish;
pub mod retry;
pub mod runner;
pub mod staging;
pub mod store_poll;

pub use cancel::CancelToken;
pub use config::{BlobBackend, QueueBackend, StoreBackend, WorkerConfig};
pub use consumer::{AckReason, Disposition, JobConsumer};
pub use error::{FailureClass, WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use publish::ClipPublisher;
pub use runner::{JobOutcome, JobRunner};
pub use staging::{SourceStager, StagedSource};
pub use store_poll::StorePollingQueue;
