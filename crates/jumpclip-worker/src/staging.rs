//! Per-job scratch directories and source download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jumpclip_models::{JobId, Video, VideoSource};
use jumpclip_storage::BlobStore;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};

/// Stages job inputs under `work_dir`.
#[derive(Clone)]
pub struct SourceStager {
    blobs: Arc<dyn BlobStore>,
    work_dir: PathBuf,
}

impl SourceStager {
    pub fn new(blobs: Arc<dyn BlobStore>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            blobs,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Create the job's scratch directory and make the source readable from it.
    ///
    /// Remote videos are downloaded into the directory; local videos are used
    /// in place and must exist. On error the directory is already gone.
    pub async fn stage(&self, job_id: &JobId, video: &Video) -> WorkerResult<StagedSource> {
        let source = video
            .source()
            .ok_or_else(|| WorkerError::NoVideoSource(video.video_id.clone()))?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", job_id))
            .tempdir_in(&self.work_dir)?;

        let path = match source {
            VideoSource::Remote(key) => {
                let dest = dir.path().join(format!("source.{}", video.extension()));
                let bytes = self.blobs.download_to_file(&key, &dest).await?;
                info!("Downloaded {} ({} bytes)", key, bytes);
                dest
            }
            VideoSource::Local(path) => {
                if !tokio::fs::try_exists(&path).await? {
                    return Err(WorkerError::SourceMissing(path));
                }
                debug!("Using local source {}", path.display());
                path
            }
        };

        Ok(StagedSource {
            scratch: dir.path().to_path_buf(),
            dir: Some(dir),
            source: path,
        })
    }
}

/// A staged source plus the scratch directory that holds it.
///
/// Dropping the value removes the directory synchronously; call
/// [`StagedSource::release`] on the normal path to do it off the runtime.
#[derive(Debug)]
pub struct StagedSource {
    dir: Option<TempDir>,
    scratch: PathBuf,
    source: PathBuf,
}

impl StagedSource {
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path for an intermediate file inside the scratch directory.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.scratch.join(name)
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Remove the scratch directory. Safe to call more than once.
    pub async fn release(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!("Removed staging dir {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove staging dir {}: {}", path.display(), e),
            Err(e) => warn!("Staging cleanup task failed for {}: {}", path.display(), e),
        }
    }
}
