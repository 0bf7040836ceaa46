//! Jump clip worker binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::sync::watch;
use tracing::{info, warn};

use jumpclip_media::{check_ffmpeg, check_ffprobe, FfmpegRenderer, MediaConfig};
use jumpclip_queue::{MessageQueue, RedisJobQueue};
use jumpclip_storage::{BlobStore, LocalBlobStore, S3BlobStore};
use jumpclip_store::{CatalogStore, FirestoreStore, JobStore, MediaStore, MemoryStore};
use jumpclip_worker::{
    init_tracing, BlobBackend, ClipPublisher, JobConsumer, JobRunner, QueueBackend,
    SourceStager, StoreBackend, StorePollingQueue, WorkerConfig,
};

const STORE_POLL_INTERVAL: Duration = Duration::from_secs(2);

struct Stores {
    jobs: Arc<dyn JobStore>,
    catalog: Arc<dyn CatalogStore>,
    media: Arc<dyn MediaStore>,
}

async fn build_stores(backend: StoreBackend) -> anyhow::Result<Stores> {
    match backend {
        StoreBackend::Firestore => {
            let store = Arc::new(
                FirestoreStore::from_env()
                    .await
                    .context("Failed to create Firestore store")?,
            );
            Ok(Stores {
                jobs: store.clone(),
                catalog: store.clone(),
                media: store,
            })
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; jobs do not survive a restart");
            let store = Arc::new(MemoryStore::new());
            Ok(Stores {
                jobs: store.clone(),
                catalog: store.clone(),
                media: store,
            })
        }
    }
}

async fn build_blobs(config: &WorkerConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let blobs: Arc<dyn BlobStore> = match config.blob_backend {
        BlobBackend::S3 => Arc::new(
            S3BlobStore::from_env()
                .await
                .context("Failed to create S3 blob store")?,
        ),
        BlobBackend::Local => {
            let mut store = LocalBlobStore::new(&config.local_blob_root);
            if let Ok(base_url) = std::env::var("JUMPCLIP_LOCAL_BLOB_BASE_URL") {
                store = store.with_base_url(base_url);
            }
            Arc::new(store)
        }
    };
    Ok(blobs)
}

async fn build_queue(
    backend: QueueBackend,
    jobs: Arc<dyn JobStore>,
) -> anyhow::Result<Arc<dyn MessageQueue>> {
    let queue: Arc<dyn MessageQueue> = match backend {
        QueueBackend::Redis => {
            let queue = RedisJobQueue::from_env().context("Failed to create job queue")?;
            queue.init().await.context("Failed to initialize job queue")?;
            Arc::new(queue)
        }
        QueueBackend::Store => Arc::new(StorePollingQueue::new(jobs, STORE_POLL_INTERVAL)),
    };
    Ok(queue)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting jumpclip-worker");

    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        jumpclip_worker::metrics::install_prometheus(port)?;
        info!("Metrics exposed on port {}", port);
    }

    let media_config = MediaConfig::from_env();
    check_ffmpeg(&media_config.ffmpeg_bin)?;
    if let Err(e) = check_ffprobe(&media_config.ffprobe_bin) {
        warn!("{}; videos without a recorded duration render unclamped", e);
    }
    let renderer = Arc::new(FfmpegRenderer::new(media_config));

    let stores = build_stores(config.store_backend).await?;
    let blobs = build_blobs(&config).await?;
    let queue = build_queue(config.queue_backend, stores.jobs.clone()).await?;

    let runner = JobRunner::new(
        stores.jobs.clone(),
        stores.catalog,
        renderer,
        SourceStager::new(blobs.clone(), &config.work_dir),
        ClipPublisher::new(blobs, stores.media),
        &config,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Received shutdown signal, finishing the current job");
        shutdown_tx.send(true).ok();
    });

    let consumer = JobConsumer::new(
        queue,
        stores.jobs,
        runner,
        config.receive_wait,
        shutdown_rx,
    );
    consumer.run().await;

    info!("Worker shutdown complete");
    Ok(())
}
