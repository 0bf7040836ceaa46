//! End-to-end pipeline tests on the in-memory store and queue, the local blob
//! store and a scripted renderer standing in for FFmpeg.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jumpclip_media::{ClipRenderer, MediaError, MediaResult, RenderOutput, RenderRequest};
use jumpclip_models::{
    Job, JobMessage, JobStatus, JobTarget, Jump, JumpMethod, OptionsBag, RenderOptions, Session,
    TargetKind, Video,
};
use jumpclip_queue::{MessageQueue, MemoryQueue};
use jumpclip_storage::{BlobStore, LocalBlobStore};
use jumpclip_store::{JobStore, MediaStore, MemoryStore};
use jumpclip_worker::{
    AckReason, ClipPublisher, Disposition, JobConsumer, JobRunner, SourceStager, WorkerConfig,
};
use tempfile::TempDir;
use tokio::sync::watch;

const FFMPEG_STDERR: &str = "Error while decoding stream #0:0: Invalid data found when processing input";

#[derive(Default)]
struct ScriptedRenderer {
    calls: AtomicUsize,
    /// 1-based call that fails like a crashed FFmpeg
    fail_on_call: Option<usize>,
    /// After this call, request cancellation of every running job
    cancel_after_call: Option<(usize, Arc<MemoryStore>)>,
    captions: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClipRenderer for ScriptedRenderer {
    async fn render(&self, request: &RenderRequest) -> MediaResult<RenderOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.captions.lock().unwrap().push(request.caption.clone());

        if self.fail_on_call == Some(call) {
            tokio::fs::write(&request.output, b"partial").await?;
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with status 1",
                Some(FFMPEG_STDERR.to_string()),
                Some(1),
            ));
        }

        tokio::fs::write(&request.output, b"fake clip bytes").await?;

        if let Some((after, store)) = &self.cancel_after_call {
            if call == *after {
                for job in store.list_by_status(JobStatus::Running, 10).await.unwrap() {
                    store.request_cancel(&job.job_id).await.unwrap();
                }
            }
        }

        Ok(RenderOutput {
            path: request.output.clone(),
            stderr_tail: String::new(),
            passes: request.options.passes(),
            window: request.window.clamped(request.source_duration_ms),
        })
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    blobs: Arc<LocalBlobStore>,
    renderer: Arc<ScriptedRenderer>,
    consumer: Arc<JobConsumer>,
    shutdown: watch::Sender<bool>,
    work_dir: TempDir,
    _blob_root: TempDir,
}

impl Harness {
    fn new(configure: impl FnOnce(&Arc<MemoryStore>) -> ScriptedRenderer) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new(Duration::from_millis(200), 3));
        let blob_root = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(LocalBlobStore::new(blob_root.path()));
        let renderer = Arc::new(configure(&store));

        let config = WorkerConfig {
            work_dir: work_dir.path().to_path_buf(),
            receive_wait: Duration::from_millis(50),
            finalize_retries: 1,
            ..WorkerConfig::default()
        };
        let runner = JobRunner::new(
            store.clone(),
            store.clone(),
            renderer.clone(),
            SourceStager::new(blobs.clone(), &config.work_dir),
            ClipPublisher::new(blobs.clone(), store.clone()),
            &config,
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let consumer = JobConsumer::new(
            queue.clone(),
            store.clone(),
            runner,
            config.receive_wait,
            shutdown_rx,
        );

        Self {
            store,
            queue,
            blobs,
            renderer,
            consumer: Arc::new(consumer),
            shutdown,
            work_dir,
            _blob_root: blob_root,
        }
    }

    /// Session `session_id` with a stored video and one jump per `(takeoff, landing)`.
    async fn seed_session(&self, session_id: &str, jumps: &[(f64, f64)], with_video: bool) {
        let video_id = format!("{}-video", session_id);
        if with_video {
            let key = format!("videos/u1/{}.mp4", video_id);
            self.blobs
                .upload(&key, b"source video".to_vec(), "video/mp4")
                .await
                .unwrap();
            self.store
                .insert_video(Video {
                    video_id: video_id.clone(),
                    owner: "u1".into(),
                    original_name: Some("training.mp4".into()),
                    storage_key: Some(key),
                    path: None,
                    mime_type: Some("video/mp4".into()),
                    size_bytes: Some(12),
                    duration_sec: Some(30.0),
                    fps: Some(60.0),
                    created_at: None,
                })
                .await;
        }
        self.store
            .insert_session(Session {
                session_id: session_id.into(),
                owner: "u1".into(),
                video_id,
                notes: None,
                created_at: None,
            })
            .await;
        for (i, (takeoff_ms, landing_ms)) in jumps.iter().enumerate() {
            self.store
                .insert_jump(Jump {
                    jump_id: format!("{}-j{}", session_id, i + 1),
                    session_id: session_id.into(),
                    takeoff_ms: *takeoff_ms,
                    landing_ms: *landing_ms,
                    method: JumpMethod::Manual,
                })
                .await;
        }
    }

    async fn enqueue(&self, target: JobTarget) -> Job {
        let job = Job::queued("u1", target, RenderOptions::default());
        self.store.put(&job).await.unwrap();
        self.queue
            .send(&JobMessage::for_job(&job).to_json().unwrap())
            .await
            .unwrap();
        job
    }

    async fn process_next(&self) -> Disposition {
        let delivery = self
            .queue
            .receive(Duration::from_millis(500))
            .await
            .unwrap()
            .expect("a message should be waiting");
        self.consumer.handle_delivery(&delivery).await
    }

    async fn job(&self, job: &Job) -> Job {
        self.store.get(&job.job_id).await.unwrap().unwrap()
    }

    async fn work_dir_entries(&self) -> usize {
        let mut count = 0;
        let mut rd = tokio::fs::read_dir(self.work_dir.path()).await.unwrap();
        while rd.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }
}

#[tokio::test]
async fn test_session_job_end_to_end() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(2000.0, 2600.0), (1000.0, 1500.0)], true)
        .await;
    let job = h.enqueue(JobTarget::session("s1")).await;

    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Completed));

    let done = h.job(&job).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.started_at.is_some());
    assert!(done.finished_at.is_some());
    assert_eq!(done.progress.total, 2);
    assert_eq!(done.progress.completed, 2);
    assert_eq!(done.progress.pct, 100);
    assert_eq!(done.outputs.len(), 2);
    assert_eq!(done.stderr_tail, None);

    let summary = done.summary.expect("summary written");
    assert_eq!(summary.session.count, 2);
    assert!(summary.session.average > 0.0);
    assert!(summary.session.best >= summary.session.average);
    // Attempt order follows takeoff time, not insertion order.
    assert_eq!(summary.per_jump[0].jump_id, "s1-j2");
    assert_eq!(summary.per_jump[1].jump_id, "s1-j1");

    let metrics_ref = done.metrics_ref.expect("metrics ref written");
    assert_eq!(metrics_ref.kind, TargetKind::Session);
    assert_eq!(metrics_ref.id, "s1");

    for media_id in &done.outputs {
        let media = h.store.get_media(media_id).await.unwrap().unwrap();
        assert_eq!(media.job_id.as_ref(), Some(&job.job_id));
        assert!(h.blobs.path_for(&media.storage.key).unwrap().exists());
    }

    let captions = h.renderer.captions.lock().unwrap().clone();
    assert!(captions[0].starts_with("Jump 1"));
    assert!(captions[1].starts_with("Jump 2"));

    assert!(h.queue.is_empty().await);
    assert_eq!(h.work_dir_entries().await, 0);
}

#[tokio::test]
async fn test_missing_video_fails_job() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0)], false).await;
    let job = h.enqueue(JobTarget::session("s1")).await;

    assert_eq!(h.process_next().await, Disposition::Abandoned);

    let failed = h.job(&job).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.outputs.is_empty());
    let tail = failed.stderr_tail.expect("diagnostic recorded");
    assert!(tail.contains("s1-video"));
    assert_eq!(h.renderer.calls(), 0);
}

#[tokio::test]
async fn test_render_failure_keeps_earlier_outputs() {
    let h = Harness::new(|_| ScriptedRenderer {
        fail_on_call: Some(2),
        ..Default::default()
    });
    h.seed_session(
        "s1",
        &[(1000.0, 1500.0), (3000.0, 3550.0), (5000.0, 5400.0), (7000.0, 7500.0)],
        true,
    )
    .await;
    let job = h.enqueue(JobTarget::session("s1")).await;

    assert_eq!(h.process_next().await, Disposition::Abandoned);

    let failed = h.job(&job).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.outputs.len(), 1);
    assert_eq!(failed.progress.completed, 1);
    assert_eq!(failed.progress.total, 4);
    assert_eq!(failed.stderr_tail.as_deref(), Some(FFMPEG_STDERR));
    assert_eq!(h.store.media_count().await, 1);
    assert_eq!(h.renderer.calls(), 2);
    assert_eq!(h.work_dir_entries().await, 0);
}

#[tokio::test]
async fn test_failed_job_redelivery_is_acked() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0)], false).await;
    let job = h.enqueue(JobTarget::session("s1")).await;
    assert_eq!(h.process_next().await, Disposition::Abandoned);

    // The unacked message comes back after the visibility timeout.
    assert_eq!(
        h.process_next().await,
        Disposition::Acked(AckReason::NotClaimable(JobStatus::Failed))
    );
    assert!(h.queue.is_empty().await);
    assert_eq!(h.job(&job).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_duplicate_delivery_does_not_rerender() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0)], true).await;
    let job = h.enqueue(JobTarget::session("s1")).await;
    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Completed));
    let before = h.job(&job).await;

    h.queue
        .send(&JobMessage::for_job(&job).to_json().unwrap())
        .await
        .unwrap();
    assert_eq!(
        h.process_next().await,
        Disposition::Acked(AckReason::NotClaimable(JobStatus::Succeeded))
    );

    assert_eq!(h.renderer.calls(), 1);
    assert_eq!(h.job(&job).await, before);
}

#[tokio::test]
async fn test_jump_target_renders_one_clip() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0), (3000.0, 3400.0)], true)
        .await;
    let job = h.enqueue(JobTarget::jump("s1-j2")).await;

    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Completed));

    let done = h.job(&job).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.outputs.len(), 1);
    assert_eq!(done.progress.total, 1);
    let summary = done.summary.unwrap();
    assert_eq!(summary.per_jump[0].jump_id, "s1-j2");
    assert_eq!(done.metrics_ref.unwrap().kind, TargetKind::Jump);
}

#[tokio::test]
async fn test_empty_session_succeeds_without_rendering() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[], true).await;
    let job = h.enqueue(JobTarget::session("s1")).await;

    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Completed));

    let done = h.job(&job).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.progress.total, 0);
    assert_eq!(done.progress.pct, 100);
    let summary = done.summary.unwrap();
    assert_eq!(summary.session.count, 0);
    assert_eq!(summary.session.coefficient_of_variation, None);
    assert_eq!(h.renderer.calls(), 0);
}

#[tokio::test]
async fn test_cancel_request_stops_between_jumps() {
    let h = Harness::new(|store| ScriptedRenderer {
        cancel_after_call: Some((1, store.clone())),
        ..Default::default()
    });
    h.seed_session("s1", &[(1000.0, 1500.0), (3000.0, 3500.0), (5000.0, 5500.0)], true)
        .await;
    let job = h.enqueue(JobTarget::session("s1")).await;

    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Cancelled));

    let cancelled = h.job(&job).await;
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert_eq!(cancelled.outputs.len(), 1);
    assert_eq!(cancelled.progress.completed, 1);
    assert_eq!(cancelled.progress.total, 3);
    assert_eq!(cancelled.summary.unwrap().session.count, 1);
    assert_eq!(h.renderer.calls(), 1);
    assert_eq!(h.work_dir_entries().await, 0);
}

#[tokio::test]
async fn test_badly_typed_message_options_are_advisory() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0)], true).await;
    let job = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
    h.store.put(&job).await.unwrap();

    let body = serde_json::json!({
        "jobId": job.job_id,
        "options": {"interpolationFps": "60", "preset": "veryfast"},
    });
    h.queue.send(&body.to_string()).await.unwrap();

    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Completed));
    assert_eq!(h.job(&job).await.status, JobStatus::Succeeded);
    assert_eq!(h.renderer.calls(), 1);
}

#[tokio::test]
async fn test_badly_typed_job_options_fail_the_job() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0)], true).await;
    let mut job = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
    job.options = OptionsBag::from(serde_json::json!({
        "interpolationFps": "60",
        "preset": "veryfast",
    }));
    h.store.put(&job).await.unwrap();
    h.queue
        .send(&JobMessage::for_job(&job).to_json().unwrap())
        .await
        .unwrap();

    assert_eq!(h.process_next().await, Disposition::Abandoned);

    let failed = h.job(&job).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .stderr_tail
        .as_deref()
        .unwrap_or_default()
        .contains("invalid render options"));
    assert_eq!(h.renderer.calls(), 0);
    assert_eq!(h.work_dir_entries().await, 0);
}

#[tokio::test]
async fn test_shutdown_lets_claimed_job_finish() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0), (3000.0, 3500.0)], true)
        .await;
    let job = h.enqueue(JobTarget::session("s1")).await;

    h.shutdown.send(true).unwrap();
    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Completed));

    let done = h.job(&job).await;
    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(done.outputs.len(), 2);
    assert_eq!(h.renderer.calls(), 2);
}

#[tokio::test]
async fn test_malformed_and_unknown_messages_are_acked() {
    let h = Harness::new(|_| ScriptedRenderer::default());

    h.queue.send("{not json").await.unwrap();
    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::Malformed));

    h.queue.send(r#"{"jobId":"does-not-exist"}"#).await.unwrap();
    assert_eq!(h.process_next().await, Disposition::Acked(AckReason::JobNotFound));

    assert!(h.queue.is_empty().await);
}

#[tokio::test]
async fn test_run_loop_processes_until_shutdown() {
    let h = Harness::new(|_| ScriptedRenderer::default());
    h.seed_session("s1", &[(1000.0, 1500.0)], true).await;

    let consumer = h.consumer.clone();
    let handle = tokio::spawn(async move { consumer.run().await });

    let job = h.enqueue(JobTarget::session("s1")).await;
    let mut status = JobStatus::Queued;
    for _ in 0..100 {
        status = h.job(&job).await.status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, JobStatus::Succeeded);

    h.shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("consumer stops on shutdown")
        .unwrap();
}
