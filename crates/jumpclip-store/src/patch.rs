//! Partial job updates.

use chrono::{DateTime, Utc};
use jumpclip_models::{
    Job, JobProgress, JobStatus, JobSummary, MediaId, MetricsRef, ModelError,
};

use crate::error::{StoreError, StoreResult};

/// Attributes to change on a job record. `updatedAt` is always written.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: Option<JobProgress>,
    pub outputs: Option<Vec<MediaId>>,
    pub summary: Option<JobSummary>,
    pub metrics_ref: Option<MetricsRef>,
    /// `Some(None)` clears the tail
    pub stderr_tail: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

impl JobPatch {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            started_at: None,
            finished_at: None,
            progress: None,
            outputs: None,
            summary: None,
            metrics_ref: None,
            stderr_tail: None,
            updated_at: now,
        }
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        if status.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
        self
    }

    pub fn progress(mut self, progress: JobProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn outputs(mut self, outputs: Vec<MediaId>) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn summary(mut self, summary: JobSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn metrics_ref(mut self, metrics_ref: MetricsRef) -> Self {
        self.metrics_ref = Some(metrics_ref);
        self
    }

    pub fn stderr_tail(mut self, tail: Option<String>) -> Self {
        self.stderr_tail = Some(tail);
        self
    }

    /// True when only diagnostic attributes are touched.
    pub fn is_diagnostic_only(&self) -> bool {
        self.status.is_none()
            && self.started_at.is_none()
            && self.finished_at.is_none()
            && self.progress.is_none()
            && self.outputs.is_none()
            && self.summary.is_none()
            && self.metrics_ref.is_none()
    }

    /// Validate the patch against the stored record.
    pub fn check(&self, current: &Job) -> StoreResult<()> {
        if current.status.is_terminal() {
            if self.is_diagnostic_only() {
                return Ok(());
            }
            return Err(StoreError::Immutable {
                job_id: current.job_id.to_string(),
                status: current.status,
            });
        }

        if let Some(next) = self.status {
            if next != current.status && !current.status.can_transition_to(next) {
                return Err(ModelError::InvalidTransition {
                    from: current.status,
                    to: next,
                }
                .into());
            }
        }

        if let Some(outputs) = &self.outputs {
            if current.status != JobStatus::Running || !outputs.starts_with(&current.outputs) {
                return Err(StoreError::OutputsRewritten(current.job_id.to_string()));
            }
        }

        Ok(())
    }

    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(finished_at) = self.finished_at {
            job.finished_at = Some(finished_at);
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(outputs) = &self.outputs {
            job.outputs = outputs.clone();
        }
        if let Some(summary) = &self.summary {
            job.summary = Some(summary.clone());
        }
        if let Some(metrics_ref) = &self.metrics_ref {
            job.metrics_ref = Some(metrics_ref.clone());
        }
        if let Some(tail) = &self.stderr_tail {
            job.stderr_tail = tail.clone();
        }
        job.updated_at = self.updated_at;
    }

    /// Record attribute names this patch writes.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.status.is_some() {
            paths.push("status");
        }
        if self.started_at.is_some() {
            paths.push("startedAt");
        }
        if self.finished_at.is_some() {
            paths.push("finishedAt");
        }
        if self.progress.is_some() {
            paths.push("progress");
        }
        if self.outputs.is_some() {
            paths.push("outputs");
        }
        if self.summary.is_some() {
            paths.push("summary");
        }
        if self.metrics_ref.is_some() {
            paths.push("metricsRef");
        }
        if self.stderr_tail.is_some() {
            paths.push("stderrTail");
        }
        paths.push("updatedAt");
        paths
    }
}
