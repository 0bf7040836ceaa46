//! Job execution.
//!
//! A claimed job is resolved to its jumps and source video, each jump is
//! rendered and published in attempt order, and the job record is finalized.
//! Outputs and progress are persisted after every clip, so a job that fails
//! halfway keeps the clips it already produced.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use jumpclip_media::{ClipRenderer, ClipWindow, RenderRequest};
use jumpclip_metrics::{compute_jump_metrics, format_overlay_text};
use jumpclip_models::{
    Job, JobProgress, JobStatus, JobSummary, JobTarget, Jump, JumpSummary, MediaId, MetricsRef,
    RenderOptions, TargetKind, Video,
};
use jumpclip_store::{CatalogStore, JobPatch, JobStore, StoreError};
use tracing::Instrument;

use crate::cancel::CancelToken;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics as worker_metrics;
use crate::publish::ClipPublisher;
use crate::retry::{retry_async, RetryConfig};
use crate::staging::{SourceStager, StagedSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { clips: usize },
    Cancelled { clips: usize },
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded { .. } => "succeeded",
            JobOutcome::Cancelled { .. } => "cancelled",
        }
    }

    pub fn clips(&self) -> usize {
        match self {
            JobOutcome::Succeeded { clips } | JobOutcome::Cancelled { clips } => *clips,
        }
    }
}

/// What has been produced so far.
struct RunState {
    total: u32,
    outputs: Vec<MediaId>,
    per_jump: Vec<JumpSummary>,
}

impl RunState {
    fn new(total: u32) -> Self {
        Self {
            total,
            outputs: Vec::new(),
            per_jump: Vec::new(),
        }
    }

    fn progress(&self) -> JobProgress {
        let completed = u32::try_from(self.per_jump.len()).unwrap_or(u32::MAX);
        JobProgress::new(completed, self.total)
    }
}

/// Per-job inputs shared by every jump.
struct JobContext<'a> {
    job: &'a Job,
    options: RenderOptions,
    staged: &'a StagedSource,
    source_duration_ms: Option<f64>,
    logger: &'a JobLogger,
}

pub struct JobRunner {
    jobs: Arc<dyn JobStore>,
    catalog: Arc<dyn CatalogStore>,
    renderer: Arc<dyn ClipRenderer>,
    stager: SourceStager,
    publisher: ClipPublisher,
    clip_pad_ms: f64,
    finalize_retry: RetryConfig,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        catalog: Arc<dyn CatalogStore>,
        renderer: Arc<dyn ClipRenderer>,
        stager: SourceStager,
        publisher: ClipPublisher,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            jobs,
            catalog,
            renderer,
            stager,
            publisher,
            clip_pad_ms: config.clip_pad_ms,
            finalize_retry: RetryConfig::new("finalize_job")
                .with_max_retries(config.finalize_retries),
        }
    }

    /// Run a job that has already been claimed (status `running`).
    ///
    /// On error the job is marked `failed` with a diagnostic tail before the
    /// error is returned.
    pub async fn execute(&self, job: &Job, cancel: &CancelToken) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(&job.job_id, &job.owner);
        let span = logger.span();

        async {
            let started = Instant::now();
            logger.log_start(&format!("{} {}", job.target.kind, job.target.id));

            match self.run(job, cancel, &logger).await {
                Ok(outcome) => {
                    worker_metrics::record_job(outcome.label(), started.elapsed());
                    logger.log_completion(&format!(
                        "{} with {} clip(s) in {:.1}s",
                        outcome.label(),
                        outcome.clips(),
                        started.elapsed().as_secs_f64()
                    ));
                    Ok(outcome)
                }
                Err(e) => {
                    logger.log_error(&format!("[{}] {}", e.class().as_str(), e));
                    self.mark_failed(job, &e, &logger).await;
                    worker_metrics::record_job("failed", started.elapsed());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        job: &Job,
        cancel: &CancelToken,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutcome> {
        let (jumps, video_id) = self.resolve_target(&job.target).await?;
        let mut state = RunState::new(u32::try_from(jumps.len()).unwrap_or(u32::MAX));

        self.jobs
            .update(&job.job_id, &JobPatch::at(Utc::now()).progress(state.progress()))
            .await?;

        let video = self
            .catalog
            .get_video(&video_id)
            .await?
            .ok_or_else(|| WorkerError::VideoMissing(video_id.clone()))?;
        let options = job.options.resolve()?;

        let cancelled = if jumps.is_empty() {
            logger.log_progress("target has no jumps");
            false
        } else {
            let mut staged = self.stager.stage(&job.job_id, &video).await?;
            let result = self
                .render_all(job, options, &video, &staged, &jumps, cancel, &mut state, logger)
                .await;
            staged.release().await;
            result?
        };

        self.finalize(job, state, cancelled).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn render_all(
        &self,
        job: &Job,
        options: RenderOptions,
        video: &Video,
        staged: &StagedSource,
        jumps: &[Jump],
        cancel: &CancelToken,
        state: &mut RunState,
        logger: &JobLogger,
    ) -> WorkerResult<bool> {
        let source_duration_ms = match video.duration_ms() {
            Some(ms) => Some(ms),
            None => match self.renderer.probe_duration_ms(staged.source()).await {
                Ok(ms) => ms,
                Err(e) => {
                    logger.log_warning(&format!("duration probe failed, not clamping: {}", e));
                    None
                }
            },
        };
        let ctx = JobContext {
            job,
            options,
            staged,
            source_duration_ms,
            logger,
        };

        for (index, jump) in jumps.iter().enumerate() {
            if cancel.is_requested(&job.job_id).await {
                logger.log_warning(&format!(
                    "cancel requested, stopping before jump {} of {}",
                    index + 1,
                    state.total
                ));
                return Ok(true);
            }
            self.render_jump(&ctx, index, jump, state).await?;
        }
        Ok(false)
    }

    async fn render_jump(
        &self,
        ctx: &JobContext<'_>,
        index: usize,
        jump: &Jump,
        state: &mut RunState,
    ) -> WorkerResult<()> {
        let job = ctx.job;
        let jump_metrics = compute_jump_metrics(jump.takeoff_ms, jump.landing_ms)?;

        let request = RenderRequest {
            source: ctx.staged.source().to_path_buf(),
            output: ctx
                .staged
                .scratch_path(&format!("{}_{}_slowmo.mp4", job.job_id, index)),
            window: ClipWindow::around_jump(jump.takeoff_ms, jump.landing_ms, self.clip_pad_ms),
            source_duration_ms: ctx.source_duration_ms,
            caption: format_overlay_text(index + 1, &jump_metrics),
            options: ctx.options,
        };
        let rendered = self.renderer.render(&request).await?;
        worker_metrics::record_clip_rendered();

        let media = self
            .publisher
            .publish(job, &jump.jump_id, &rendered.path)
            .await?;

        state.outputs.push(media.media_id);
        state.per_jump.push(JumpSummary {
            jump_id: jump.jump_id.clone(),
            metrics: jump_metrics,
        });
        let patch = JobPatch::at(Utc::now())
            .outputs(state.outputs.clone())
            .progress(state.progress());
        self.jobs.update(&job.job_id, &patch).await?;

        ctx.logger.log_progress(&format!(
            "jump {}/{} rendered, height {:.3} m",
            index + 1,
            state.total,
            jump_metrics.height_m
        ));
        Ok(())
    }

    /// Jumps in attempt order plus the id of the video they were filmed in.
    async fn resolve_target(&self, target: &JobTarget) -> WorkerResult<(Vec<Jump>, String)> {
        match target.kind {
            TargetKind::Session => {
                let session = self
                    .catalog
                    .get_session(&target.id)
                    .await?
                    .ok_or_else(|| WorkerError::target_not_found(TargetKind::Session, &target.id))?;
                let jumps = self
                    .catalog
                    .list_jumps_by_session(&session.session_id)
                    .await?;
                Ok((jumps, session.video_id))
            }
            TargetKind::Jump => {
                let jump = self
                    .catalog
                    .get_jump(&target.id)
                    .await?
                    .ok_or_else(|| WorkerError::target_not_found(TargetKind::Jump, &target.id))?;
                let session = self
                    .catalog
                    .get_session(&jump.session_id)
                    .await?
                    .ok_or_else(|| {
                        WorkerError::target_not_found(TargetKind::Session, &jump.session_id)
                    })?;
                Ok((vec![jump], session.video_id))
            }
        }
    }

    async fn finalize(
        &self,
        job: &Job,
        state: RunState,
        cancelled: bool,
    ) -> WorkerResult<JobOutcome> {
        let clips = state.outputs.len();
        let (status, outcome) = if cancelled {
            (JobStatus::Cancelled, JobOutcome::Cancelled { clips })
        } else {
            (JobStatus::Succeeded, JobOutcome::Succeeded { clips })
        };

        let progress = state.progress();
        let summary = JobSummary::from_jumps(state.per_jump);
        let metrics_ref = MetricsRef::from(&job.target);
        let outputs = state.outputs;

        retry_async(&self.finalize_retry, StoreError::is_retryable, || {
            let patch = JobPatch::at(Utc::now())
                .status(status)
                .progress(progress)
                .outputs(outputs.clone())
                .summary(summary.clone())
                .metrics_ref(metrics_ref.clone())
                .stderr_tail(None);
            async move { self.jobs.update(&job.job_id, &patch).await }
        })
        .await?;

        Ok(outcome)
    }

    async fn mark_failed(&self, job: &Job, error: &WorkerError, logger: &JobLogger) {
        let tail = error.diagnostic();
        let result = retry_async(&self.finalize_retry, StoreError::is_retryable, || {
            let patch = JobPatch::at(Utc::now())
                .status(JobStatus::Failed)
                .stderr_tail(Some(tail.clone()));
            async move { self.jobs.update(&job.job_id, &patch).await }
        })
        .await;

        if let Err(e) = result {
            logger.log_error(&format!("could not record failure: {}", e));
        }
    }
}
