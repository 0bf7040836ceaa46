//! Blob store on the local filesystem.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::blob::BlobStore;
use crate::error::{StorageError, StorageResult};

/// Stores objects as files under `root`, keyed by relative path.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    /// Base URL the root is served from; `file://` URLs otherwise
    base_url: Option<String>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `key`. Keys must be relative and stay under the root.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::invalid_key(key));
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, key: &str, path: &Path) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("file://{}", path.display()),
        }
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn not_found_or(key: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(key)
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| not_found_or(key, e))
    }

    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let path = self.path_for(key)?;
        Self::ensure_parent(dest).await?;
        let written = tokio::fs::copy(&path, dest)
            .await
            .map_err(|e| not_found_or(key, e))?;
        debug!("Copied {} to {} ({} bytes)", key, dest.display(), written);
        Ok(written)
    }

    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;
        tokio::fs::write(&path, data).await?;
        Ok(self.url_for(key, &path))
    }

    async fn upload_file(
        &self,
        source: &Path,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;
        tokio::fs::copy(source, &path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", source.display(), e)))?;
        Ok(self.url_for(key, &path))
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        let path = self.path_for(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StorageError::not_found(key));
        }
        Ok(self.url_for(key, &path))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(e.to_string())),
        }
    }
}
