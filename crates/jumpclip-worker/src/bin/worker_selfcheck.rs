//! Pre-flight checks for a worker host.

use std::path::Path;

use jumpclip_media::{check_ffmpeg, check_ffprobe, resolve_font, MediaConfig};
use jumpclip_storage::S3Config;
use jumpclip_store::FirestoreConfig;
use jumpclip_worker::{BlobBackend, QueueBackend, StoreBackend, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;
    let media = MediaConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    let ffmpeg = check_ffmpeg(&media.ffmpeg_bin)?;
    println!("worker-selfcheck: ffmpeg at {}", ffmpeg.display());
    match check_ffprobe(&media.ffprobe_bin) {
        Ok(path) => println!("worker-selfcheck: ffprobe at {}", path.display()),
        Err(e) => println!("worker-selfcheck: warning: {}", e),
    }
    match media.font_path.clone().filter(|p| p.is_file()).or_else(resolve_font) {
        Some(font) => println!("worker-selfcheck: caption font {}", font.display()),
        None => println!("worker-selfcheck: warning: no caption font found"),
    }

    if config.queue_backend == QueueBackend::Redis {
        ensure_env_present(&["REDIS_URL"])?;
    }
    if config.store_backend == StoreBackend::Firestore {
        let firestore = FirestoreConfig::from_env()?;
        println!("worker-selfcheck: firestore project {}", firestore.project_id);
    }
    if config.blob_backend == BlobBackend::S3 {
        let s3 = S3Config::from_env()?;
        println!("worker-selfcheck: bucket {}", s3.bucket);
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::NamedTempFile::new_in(path)
        .map_err(|e| anyhow::anyhow!("work dir {} is not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
