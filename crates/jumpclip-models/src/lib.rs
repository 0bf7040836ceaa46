//! Shared data models for the JumpClip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle status and progress
//! - Queue messages
//! - Rendering options
//! - Catalog inputs (videos, sessions, jumps) and produced media

pub mod catalog;
pub mod error;
pub mod ids;
pub mod job;
pub mod job_status;
pub mod media;
pub mod message;
pub mod options;

pub use catalog::{Jump, JumpMethod, Session, Video, VideoSource};
pub use error::{ModelError, ModelResult};
pub use ids::{JobId, MediaId};
pub use job::{Job, JobProgress, JobSummary, JobTarget, JumpSummary, MetricsRef, TargetKind};
pub use job_status::JobStatus;
pub use media::{Media, MediaKind, StorageLocation};
pub use message::JobMessage;
pub use options::{OptionsBag, Preset, RenderOptions};
