//! Read-only catalog inputs: videos, sessions and jumps.
//!
//! These records are owned by the CRUD layer; the pipeline only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Uploaded source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub video_id: String,
    pub owner: String,
    #[serde(default)]
    pub original_name: Option<String>,
    /// Object key in blob storage
    #[serde(default)]
    pub storage_key: Option<String>,
    /// Path on a shared local disk (development uploads)
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where the bytes of a video live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Remote(String),
    Local(PathBuf),
}

impl Video {
    /// Blob storage wins over a local path when both are set.
    pub fn source(&self) -> Option<VideoSource> {
        match (&self.storage_key, &self.path) {
            (Some(key), _) if !key.is_empty() => Some(VideoSource::Remote(key.clone())),
            (_, Some(path)) if !path.is_empty() => Some(VideoSource::Local(PathBuf::from(path))),
            _ => None,
        }
    }

    /// Known duration in milliseconds, if positive and finite.
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_sec
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d * 1000.0)
    }

    /// File extension of the original upload, `mp4` when unknown.
    pub fn extension(&self) -> &str {
        self.original_name
            .as_deref()
            .or(self.storage_key.as_deref())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && !ext.contains('/'))
            .unwrap_or("mp4")
    }
}

/// A training session recorded in one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub owner: String,
    pub video_id: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JumpMethod {
    #[default]
    Manual,
    Refined,
}

/// One marked jump. `landing_ms >= takeoff_ms` is not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jump {
    pub jump_id: String,
    pub session_id: String,
    pub takeoff_ms: f64,
    pub landing_ms: f64,
    #[serde(default)]
    pub method: JumpMethod,
}
