//! QC orchestration.
//!
//! [`QcService`] owns the project state machine: it creates projects, starts
//! QC runs by publishing request events, and folds worker progress back into
//! the project and raw media records.

pub mod events;
mod service;

pub use events::{ProgressEvent, QcRequestEvent};
pub use service::{InitiateOutcome, ProgressOutcome, ProgressSnapshot, ProjectPage, QcService};

use serde::{Deserialize, Serialize};

/// Largest page size a list request may ask for.
pub const MAX_PER_PAGE: u32 = 100;

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcConfig {
    /// Base URL workers post progress to.
    pub progress_base_url: String,
    /// Region of the bucket holding raw media.
    pub s3_region: String,
    pub request_topic: String,
    pub consumer_group: String,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            progress_base_url: "http://localhost:12555".to_string(),
            s3_region: "us-east-1".to_string(),
            request_topic: "qc-requested".to_string(),
            consumer_group: "qc-dispatch".to_string(),
        }
    }
}
