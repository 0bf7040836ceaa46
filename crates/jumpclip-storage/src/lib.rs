//! Blob storage for source videos and rendered clips.
//!
//! [`BlobStore`] is the seam the worker talks to. Two backends:
//! - [`S3BlobStore`] for S3-compatible object storage (AWS, R2, MinIO)
//! - [`LocalBlobStore`] rooted at a directory, for development and tests

pub mod blob;
pub mod error;
pub mod keys;
pub mod local;
pub mod s3;

pub use blob::BlobStore;
pub use error::{StorageError, StorageResult};
pub use keys::clip_key;
pub use local::LocalBlobStore;
pub use s3::{S3BlobStore, S3Config};
