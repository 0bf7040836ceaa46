//! Repository traits over Firestore collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jumpclip_models::{Job, JobId, JobStatus, Jump, Media, MediaId, Session, Video};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::client::FirestoreClient;
use super::metrics::record_conflict;
use super::types::{from_document, to_fields, Direction, Document, StructuredQuery, Value};
use crate::error::{StoreError, StoreResult};
use crate::patch::JobPatch;
use crate::repo::{sort_jumps, CatalogStore, ClaimOutcome, JobStore, MediaStore};

pub const JOBS: &str = "jobs";
pub const VIDEOS: &str = "videos";
pub const SESSIONS: &str = "sessions";
pub const JUMPS: &str = "jumps";
pub const MEDIA: &str = "media";

/// Read-check-write attempts before giving up with `Conflict`.
const MAX_CAS_ATTEMPTS: u32 = 5;

const CLAIM_FIELDS: &[&str] = &["status", "startedAt", "progress", "updatedAt"];

#[derive(Clone)]
pub struct FirestoreStore {
    client: FirestoreClient,
}

impl FirestoreStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn from_env() -> StoreResult<Self> {
        Ok(Self::new(FirestoreClient::from_env().await?))
    }

    async fn fetch(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let doc = self
            .client
            .with_retry("get_document", || self.client.get_document(collection, id))
            .await?;
        Ok(doc)
    }

    async fn fetch_record<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        id_field: &str,
    ) -> StoreResult<Option<T>> {
        match self.fetch(collection, id).await? {
            Some(doc) => decode(collection, id, &doc, id_field).map(Some),
            None => Ok(None),
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        id_field: &str,
        query: StructuredQuery,
    ) -> StoreResult<Vec<T>> {
        let docs = self
            .client
            .with_retry("run_query", || self.client.run_query(query.clone()))
            .await?;
        docs.iter()
            .map(|doc| decode(collection, doc.id().unwrap_or_default(), doc, id_field))
            .collect()
    }

    /// Write `fields` of `job` only if the stored document is unchanged since `update_time`.
    async fn write_if_unchanged(
        &self,
        job: &Job,
        fields: &[&str],
        update_time: Option<&str>,
    ) -> StoreResult<bool> {
        let all = to_fields(job).map_err(|e| StoreError::decode(JOBS, job.job_id.as_str(), e.to_string()))?;
        let masked = all
            .into_iter()
            .filter(|(k, _)| fields.contains(&k.as_str()))
            .collect();

        match self
            .client
            .update_document(JOBS, job.job_id.as_str(), masked, Some(fields), update_time)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_precondition_failed() => {
                record_conflict(JOBS);
                debug!(job_id = %job.job_id, "Job changed underneath us; re-reading");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn decode<T: DeserializeOwned>(
    collection: &str,
    id: &str,
    doc: &Document,
    id_field: &str,
) -> StoreResult<T> {
    from_document(doc, Some(id_field)).map_err(|e| StoreError::decode(collection, id, e.to_string()))
}

#[async_trait]
impl JobStore for FirestoreStore {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        self.fetch_record(JOBS, job_id.as_str(), "jobId").await
    }

    async fn put(&self, job: &Job) -> StoreResult<()> {
        let fields = to_fields(job).map_err(|e| StoreError::decode(JOBS, job.job_id.as_str(), e.to_string()))?;
        self.client
            .update_document(JOBS, job.job_id.as_str(), fields, None, None)
            .await?;
        Ok(())
    }

    async fn update(&self, job_id: &JobId, patch: &JobPatch) -> StoreResult<()> {
        let paths = patch.field_paths();
        for _ in 0..MAX_CAS_ATTEMPTS {
            let doc = self
                .fetch(JOBS, job_id.as_str())
                .await?
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            let mut job: Job = decode(JOBS, job_id.as_str(), &doc, "jobId")?;

            patch.check(&job)?;
            patch.apply(&mut job);

            if self
                .write_if_unchanged(&job, &paths, doc.update_time.as_deref())
                .await?
            {
                return Ok(());
            }
        }
        warn!(job_id = %job_id, "Giving up on job update after repeated conflicts");
        Err(StoreError::Conflict(job_id.to_string()))
    }

    async fn claim(&self, job_id: &JobId, now: DateTime<Utc>) -> StoreResult<ClaimOutcome> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(doc) = self.fetch(JOBS, job_id.as_str()).await? else {
                return Ok(ClaimOutcome::NotFound);
            };
            let mut job: Job = decode(JOBS, job_id.as_str(), &doc, "jobId")?;
            if job.status != JobStatus::Queued {
                return Ok(ClaimOutcome::NotClaimable(job.status));
            }

            job.start(now)?;
            if self
                .write_if_unchanged(&job, CLAIM_FIELDS, doc.update_time.as_deref())
                .await?
            {
                return Ok(ClaimOutcome::Claimed(job));
            }
        }
        Err(StoreError::Conflict(job_id.to_string()))
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<Job>> {
        let query = StructuredQuery::collection(JOBS)
            .where_eq("status", Value::StringValue(status.as_str().to_string()))
            .order_by("queuedAt", Direction::Ascending)
            .limit(limit);
        self.query(JOBS, "jobId", query).await
    }

    async fn list_by_owner(&self, owner: &str, limit: usize) -> StoreResult<Vec<Job>> {
        let query = StructuredQuery::collection(JOBS)
            .where_eq("owner", Value::StringValue(owner.to_string()))
            .order_by("queuedAt", Direction::Descending)
            .limit(limit);
        self.query(JOBS, "jobId", query).await
    }
}

#[async_trait]
impl CatalogStore for FirestoreStore {
    async fn get_video(&self, video_id: &str) -> StoreResult<Option<Video>> {
        self.fetch_record(VIDEOS, video_id, "videoId").await
    }

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        self.fetch_record(SESSIONS, session_id, "sessionId").await
    }

    async fn get_jump(&self, jump_id: &str) -> StoreResult<Option<Jump>> {
        self.fetch_record(JUMPS, jump_id, "jumpId").await
    }

    async fn list_jumps_by_session(&self, session_id: &str) -> StoreResult<Vec<Jump>> {
        let query = StructuredQuery::collection(JUMPS)
            .where_eq("sessionId", Value::StringValue(session_id.to_string()));
        let mut jumps: Vec<Jump> = self.query(JUMPS, "jumpId", query).await?;
        sort_jumps(&mut jumps);
        Ok(jumps)
    }
}

#[async_trait]
impl MediaStore for FirestoreStore {
    async fn create_media(&self, media: &Media) -> StoreResult<()> {
        let id = media.media_id.as_str();
        let fields = to_fields(media).map_err(|e| StoreError::decode(MEDIA, id, e.to_string()))?;
        match self.client.create_document(MEDIA, id, fields).await {
            Ok(_) => Ok(()),
            Err(super::FirestoreError::AlreadyExists(_)) => {
                Err(StoreError::AlreadyExists(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_media(&self, media_id: &MediaId) -> StoreResult<Option<Media>> {
        self.fetch_record(MEDIA, media_id.as_str(), "mediaId").await
    }

    async fn list_media_by_owner(&self, owner: &str, limit: usize) -> StoreResult<Vec<Media>> {
        let query = StructuredQuery::collection(MEDIA)
            .where_eq("owner", Value::StringValue(owner.to_string()))
            .order_by("createdAt", Direction::Descending)
            .limit(limit);
        self.query(MEDIA, "mediaId", query).await
    }
}
