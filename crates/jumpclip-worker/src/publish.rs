//! Clip upload and media record creation.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use jumpclip_models::{Job, Media, MediaId, MediaKind, StorageLocation};
use jumpclip_storage::{clip_key, BlobStore};
use jumpclip_store::MediaStore;
use tracing::{info, warn};

use crate::error::WorkerResult;

const CLIP_CONTENT_TYPE: &str = "video/mp4";

#[derive(Clone)]
pub struct ClipPublisher {
    blobs: Arc<dyn BlobStore>,
    media: Arc<dyn MediaStore>,
}

impl ClipPublisher {
    pub fn new(blobs: Arc<dyn BlobStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { blobs, media }
    }

    /// Upload a rendered clip and record it as a `slowmo` media item.
    ///
    /// The local file is removed whether or not the upload succeeds.
    pub async fn publish(&self, job: &Job, jump_id: &str, clip: &Path) -> WorkerResult<Media> {
        let result = self.upload_and_record(job, jump_id, clip).await;

        if let Err(e) = tokio::fs::remove_file(clip).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove local clip {}: {}", clip.display(), e);
            }
        }
        result
    }

    async fn upload_and_record(&self, job: &Job, jump_id: &str, clip: &Path) -> WorkerResult<Media> {
        let size_bytes = tokio::fs::metadata(clip).await?.len();
        let media_id = MediaId::new();
        let key = clip_key(&job.owner, &media_id);
        let url = self.blobs.upload_file(clip, &key, CLIP_CONTENT_TYPE).await?;

        let media = Media {
            media_id,
            owner: job.owner.clone(),
            kind: MediaKind::Slowmo,
            storage: StorageLocation { key, url },
            size_bytes,
            created_at: Utc::now(),
            job_id: Some(job.job_id.clone()),
            jump_id: Some(jump_id.to_string()),
        };
        self.media.create_media(&media).await?;

        info!(
            media_id = %media.media_id,
            jump_id = %jump_id,
            "Published clip {} ({} bytes)",
            media.storage.key,
            size_bytes
        );
        Ok(media)
    }
}
