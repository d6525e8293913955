//! QC project entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::QcStatus;

/// A single defect reported by the QC worker, located by its time span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: String,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Immutable record of one status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: QcStatus,
    pub issues: Vec<Issue>,
    pub raw_media_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(status: QcStatus, issues: Vec<Issue>, raw_media_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status,
            issues,
            raw_media_id,
        }
    }
}

/// One tracked request to quality-check an uploaded video asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcProject {
    pub project_id: String,
    pub raw_media_id: Option<String>,
    pub video_url: Option<String>,
    pub status: QcStatus,
    /// Latest issue snapshot.
    pub issues: Vec<Issue>,
    /// Append-only, one entry per status transition.
    pub history: Vec<HistoryEntry>,
    pub no_of_attempts: u32,
    pub qc_request_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QcProject {
    /// Create a new project in `CREATED` with no history.
    pub fn new(
        created_by: impl Into<String>,
        project_id: impl Into<String>,
        raw_media_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            raw_media_id,
            video_url: None,
            status: QcStatus::Created,
            issues: Vec::new(),
            history: Vec::new(),
            no_of_attempts: 0,
            qc_request_id: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an asset is attached, which `initiate` requires.
    pub fn has_asset(&self) -> bool {
        self.raw_media_id.is_some() && self.video_url.is_some()
    }

    /// History entry to append if moving to `next` is a real transition.
    pub fn transition_entry(&self, next: QcStatus, issues: &[Issue]) -> Option<HistoryEntry> {
        (self.status != next)
            .then(|| HistoryEntry::new(next, issues.to_vec(), self.raw_media_id.clone()))
    }

    /// Whether an event tagged with `attempt` belongs to a superseded run.
    pub fn is_stale_attempt(&self, attempt: Option<u32>) -> bool {
        attempt.is_some_and(|a| a < self.no_of_attempts)
    }
}
