//! Repository interfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jumpclip_models::{Job, JobId, JobStatus, Jump, Media, MediaId, Session, Video};

use crate::error::StoreResult;
use crate::patch::JobPatch;

/// Result of trying to claim a job.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The caller now owns the job; it is `running`.
    Claimed(Job),
    /// The job exists but is not `queued`.
    NotClaimable(JobStatus),
    NotFound,
}

/// Durable job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>>;

    /// Full replace.
    async fn put(&self, job: &Job) -> StoreResult<()>;

    /// Partial update, validated against the stored record.
    async fn update(&self, job_id: &JobId, patch: &JobPatch) -> StoreResult<()>;

    /// Atomically move a `queued` job to `running`.
    ///
    /// Sets `startedAt`/`updatedAt` to `now` and resets progress. At most one
    /// concurrent caller gets [`ClaimOutcome::Claimed`].
    async fn claim(&self, job_id: &JobId, now: DateTime<Utc>) -> StoreResult<ClaimOutcome>;

    /// Jobs in `status`, oldest `queuedAt` first.
    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<Job>>;

    /// Jobs of `owner`, newest `queuedAt` first.
    async fn list_by_owner(&self, owner: &str, limit: usize) -> StoreResult<Vec<Job>>;
}

/// Read-only catalog owned by the CRUD layer.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_video(&self, video_id: &str) -> StoreResult<Option<Video>>;

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<Session>>;

    async fn get_jump(&self, jump_id: &str) -> StoreResult<Option<Jump>>;

    /// Jumps of a session ordered by `takeoffMs`.
    async fn list_jumps_by_session(&self, session_id: &str) -> StoreResult<Vec<Jump>>;
}

/// Media records; created once, never updated.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fails with `AlreadyExists` if the id is taken.
    async fn create_media(&self, media: &Media) -> StoreResult<()>;

    async fn get_media(&self, media_id: &MediaId) -> StoreResult<Option<Media>>;

    async fn list_media_by_owner(&self, owner: &str, limit: usize) -> StoreResult<Vec<Media>>;
}

/// Sort jumps the way [`CatalogStore::list_jumps_by_session`] promises.
pub(crate) fn sort_jumps(jumps: &mut [Jump]) {
    jumps.sort_by(|a, b| {
        a.takeoff_ms
            .total_cmp(&b.takeoff_ms)
            .then_with(|| a.jump_id.cmp(&b.jump_id))
    });
}
