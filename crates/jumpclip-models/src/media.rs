//! Produced media records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, MediaId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Slowmo,
    Montage,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Slowmo => "slowmo",
            MediaKind::Montage => "montage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub key: String,
    pub url: String,
}

/// A rendered artifact. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub media_id: MediaId,
    pub owner: String,
    pub kind: MediaKind,
    pub storage: StorageLocation,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Job that produced this media
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub jump_id: Option<String>,
}
