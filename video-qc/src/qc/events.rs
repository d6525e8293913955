//! Wire payloads exchanged with the QC worker.

use serde::{Deserialize, Serialize};

use crate::domain::{Issue, QcProgressType, WorkerStatus};

/// Message published on the request topic and handed verbatim to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcRequestEvent {
    pub project_id: String,
    /// Base URL the worker posts progress to.
    pub progress_base_url: String,
    pub s3_bucket: String,
    pub s3_file_key: String,
    pub s3_region: String,
    /// Bearer token the worker presents on the progress webhook.
    pub token: String,
    /// Attempt number this request belongs to. The worker echoes it back.
    pub attempt: u32,
}

/// Progress report posted by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub project_id: String,
    pub status: WorkerStatus,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub progress_type: Option<QcProgressType>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Absent for workers that predate attempt tagging.
    #[serde(default)]
    pub attempt: Option<u32>,
}
