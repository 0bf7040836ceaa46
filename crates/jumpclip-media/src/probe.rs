//! FFprobe duration lookup.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Container duration in milliseconds, `None` if FFprobe reports none.
pub async fn probe_duration_ms(ffprobe: &Path, path: &Path) -> MediaResult<Option<f64>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| MediaError::spawn_failed(ffprobe.to_string_lossy(), e))?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_duration_ms(&output.stdout)
}

fn parse_duration_ms(stdout: &[u8]) -> MediaResult<Option<f64>> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;
    Ok(probe
        .format
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|secs| secs * 1000.0))
}
