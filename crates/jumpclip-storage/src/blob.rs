//! Blob store interface.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Keyed object storage used for source videos and rendered clips.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object into memory.
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Stream an object to `dest`, creating parent directories. Returns bytes written.
    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64>;

    /// Store bytes under `key` and return the object's URL.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Store a local file under `key` and return the object's URL.
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str)
        -> StorageResult<String>;

    /// Time-limited GET URL.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
