//! Job record.

use chrono::{DateTime, Utc};
use jumpclip_metrics::{JumpMetrics, SessionStats};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::ids::{JobId, MediaId};
use crate::job_status::JobStatus;
use crate::options::{OptionsBag, RenderOptions};

/// What a job renders: every jump in a session, or a single jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Session,
    Jump,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Session => "session",
            TargetKind::Jump => "jump",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    #[serde(rename = "targetType")]
    pub kind: TargetKind,
    #[serde(rename = "targetId")]
    pub id: String,
}

impl JobTarget {
    pub fn session(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Session,
            id: id.into(),
        }
    }

    pub fn jump(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Jump,
            id: id.into(),
        }
    }
}

/// Progress counters. `completed <= total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobProgress {
    pub completed: u32,
    pub total: u32,
    pub pct: u8,
}

impl JobProgress {
    /// Progress of `completed` out of `total`; an empty job reads as 100%.
    pub fn new(completed: u32, total: u32) -> Self {
        let completed = completed.min(total);
        let pct = if total == 0 {
            100
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            completed,
            total,
            pct,
        }
    }

    /// The `{0, 0, 0}` state a freshly claimed job starts from.
    pub fn reset() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpSummary {
    pub jump_id: String,
    pub metrics: JumpMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub per_jump: Vec<JumpSummary>,
    pub session: SessionStats,
}

impl JobSummary {
    /// Summary over per-jump metrics, in attempt order.
    pub fn from_jumps(per_jump: Vec<JumpSummary>) -> Self {
        let heights: Vec<f64> = per_jump.iter().map(|j| j.metrics.height_m).collect();
        Self {
            session: SessionStats::from_heights(&heights),
            per_jump,
        }
    }
}

/// Back-link to the entity a summary describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRef {
    pub kind: TargetKind,
    pub id: String,
}

impl From<&JobTarget> for MetricsRef {
    fn from(target: &JobTarget) -> Self {
        Self {
            kind: target.kind,
            id: target.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub owner: String,
    #[serde(flatten)]
    pub target: JobTarget,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub progress: JobProgress,
    /// Raw options bag; typed and checked when the job runs
    #[serde(default)]
    pub options: OptionsBag,
    /// Media ids in jump order
    #[serde(default)]
    pub outputs: Vec<MediaId>,
    #[serde(default)]
    pub summary: Option<JobSummary>,
    #[serde(default)]
    pub metrics_ref: Option<MetricsRef>,
    /// Bounded diagnostic text, set on failure
    #[serde(default)]
    pub stderr_tail: Option<String>,
    /// Set externally to stop the job at the next jump boundary
    #[serde(default)]
    pub cancel_requested: bool,
}

impl Job {
    /// A queued job, as the API layer creates it.
    pub fn queued(owner: impl Into<String>, target: JobTarget, options: RenderOptions) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            owner: owner.into(),
            target,
            status: JobStatus::Queued,
            queued_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
            progress: JobProgress::reset(),
            options: options.into(),
            outputs: Vec::new(),
            summary: None,
            metrics_ref: None,
            stderr_tail: None,
            cancel_requested: false,
        }
    }

    /// Move to `next`, stamping `updatedAt` and, for terminal states, `finishedAt`.
    pub fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Claim a queued job: `running`, fresh `startedAt`, progress reset.
    pub fn start(&mut self, now: DateTime<Utc>) -> ModelResult<()> {
        self.transition(JobStatus::Running, now)?;
        self.started_at = Some(now);
        self.progress = JobProgress::reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_pct() {
        assert_eq!(JobProgress::new(0, 0).pct, 100);
        assert_eq!(JobProgress::new(1, 3).pct, 33);
        assert_eq!(JobProgress::new(2, 3).pct, 67);
        assert_eq!(JobProgress::reset().pct, 0);
    }

    #[test]
    fn test_progress_completed_never_exceeds_total() {
        let p = JobProgress::new(5, 2);
        assert_eq!(p.completed, 2);
        assert_eq!(p.pct, 100);
    }

    #[test]
    fn test_start_from_queued() {
        let mut job = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
        job.progress = JobProgress::new(1, 2);
        let now = Utc::now();
        job.start(now).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.started_at, Some(now));
        assert_eq!(job.progress, JobProgress::reset());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut job = Job::queued("u1", JobTarget::jump("j1"), RenderOptions::default());
        job.start(Utc::now()).unwrap();
        let err = job.start(Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidTransition {
                from: JobStatus::Running,
                to: JobStatus::Running
            }
        );
    }

    #[test]
    fn test_terminal_transition_sets_finished_at() {
        let mut job = Job::queued("u1", JobTarget::jump("j1"), RenderOptions::default());
        job.start(Utc::now()).unwrap();
        job.transition(JobStatus::Failed, Utc::now()).unwrap();
        assert!(job.finished_at.is_some());
        assert!(job.transition(JobStatus::Succeeded, Utc::now()).is_err());
    }

    #[test]
    fn test_record_uses_store_attribute_names() {
        let job = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
        let json = serde_json::to_value(&job).unwrap();
        for key in [
            "jobId",
            "owner",
            "targetType",
            "targetId",
            "status",
            "queuedAt",
            "updatedAt",
            "progress",
            "options",
            "outputs",
            "stderrTail",
            "metricsRef",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["targetType"], "session");

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_record_with_bad_options_still_decodes() {
        let job = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
        let mut json = serde_json::to_value(&job).unwrap();
        json["options"] = serde_json::json!({"interpolationFps": "60", "preset": "veryfast"});

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back.job_id, job.job_id);
        assert!(matches!(back.options.resolve(), Err(ModelError::InvalidOptions(_))));
    }

    #[test]
    fn test_summary_from_jumps() {
        let per_jump = vec![
            JumpSummary {
                jump_id: "a".into(),
                metrics: jumpclip_metrics::compute_jump_metrics(1000.0, 1500.0).unwrap(),
            },
            JumpSummary {
                jump_id: "b".into(),
                metrics: jumpclip_metrics::compute_jump_metrics(2000.0, 2600.0).unwrap(),
            },
        ];
        let summary = JobSummary::from_jumps(per_jump);
        assert_eq!(summary.session.count, 2);
        assert!(summary.session.best > summary.session.average);
        assert!(summary.session.fatigue_slope > 0.0);
    }
}
