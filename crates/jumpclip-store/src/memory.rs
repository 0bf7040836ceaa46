//! In-process store for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jumpclip_models::{Job, JobId, JobStatus, Jump, Media, MediaId, Session, Video};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::patch::JobPatch;
use crate::repo::{sort_jumps, CatalogStore, ClaimOutcome, JobStore, MediaStore};

#[derive(Default)]
struct Tables {
    jobs: HashMap<JobId, Job>,
    videos: HashMap<String, Video>,
    sessions: HashMap<String, Session>,
    jumps: HashMap<String, Jump>,
    media: HashMap<MediaId, Media>,
}

/// Implements every repository trait over in-memory tables.
///
/// All checks and writes happen under one lock, so `claim` and `update`
/// are atomic with respect to each other.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_video(&self, video: Video) {
        let mut t = self.tables.write().await;
        t.videos.insert(video.video_id.clone(), video);
    }

    pub async fn insert_session(&self, session: Session) {
        let mut t = self.tables.write().await;
        t.sessions.insert(session.session_id.clone(), session);
    }

    pub async fn insert_jump(&self, jump: Jump) {
        let mut t = self.tables.write().await;
        t.jumps.insert(jump.jump_id.clone(), jump);
    }

    /// External stop request, as the API layer would issue it.
    pub async fn request_cancel(&self, job_id: &JobId) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let job = t
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        job.cancel_requested = true;
        Ok(())
    }

    pub async fn media_count(&self) -> usize {
        self.tables.read().await.media.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.tables.read().await.jobs.get(job_id).cloned())
    }

    async fn put(&self, job: &Job) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn update(&self, job_id: &JobId, patch: &JobPatch) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let job = t
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        patch.check(job)?;
        patch.apply(job);
        Ok(())
    }

    async fn claim(&self, job_id: &JobId, now: DateTime<Utc>) -> StoreResult<ClaimOutcome> {
        let mut t = self.tables.write().await;
        let Some(job) = t.jobs.get_mut(job_id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if job.status != JobStatus::Queued {
            return Ok(ClaimOutcome::NotClaimable(job.status));
        }
        job.start(now)?;
        Ok(ClaimOutcome::Claimed(job.clone()))
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<Job>> {
        let t = self.tables.read().await;
        let mut jobs: Vec<Job> = t
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.queued_at.cmp(&b.queued_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn list_by_owner(&self, owner: &str, limit: usize) -> StoreResult<Vec<Job>> {
        let t = self.tables.read().await;
        let mut jobs: Vec<Job> = t
            .jobs
            .values()
            .filter(|j| j.owner == owner)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.queued_at.cmp(&a.queued_at));
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_video(&self, video_id: &str) -> StoreResult<Option<Video>> {
        Ok(self.tables.read().await.videos.get(video_id).cloned())
    }

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(session_id).cloned())
    }

    async fn get_jump(&self, jump_id: &str) -> StoreResult<Option<Jump>> {
        Ok(self.tables.read().await.jumps.get(jump_id).cloned())
    }

    async fn list_jumps_by_session(&self, session_id: &str) -> StoreResult<Vec<Jump>> {
        let t = self.tables.read().await;
        let mut jumps: Vec<Jump> = t
            .jumps
            .values()
            .filter(|j| j.session_id == session_id)
            .cloned()
            .collect();
        sort_jumps(&mut jumps);
        Ok(jumps)
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn create_media(&self, media: &Media) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.media.contains_key(&media.media_id) {
            return Err(StoreError::AlreadyExists(media.media_id.to_string()));
        }
        t.media.insert(media.media_id.clone(), media.clone());
        Ok(())
    }

    async fn get_media(&self, media_id: &MediaId) -> StoreResult<Option<Media>> {
        Ok(self.tables.read().await.media.get(media_id).cloned())
    }

    async fn list_media_by_owner(&self, owner: &str, limit: usize) -> StoreResult<Vec<Media>> {
        let t = self.tables.read().await;
        let mut media: Vec<Media> = t
            .media
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect();
        media.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        media.truncate(limit);
        Ok(media)
    }
}
