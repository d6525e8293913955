//! QC status values and the mapping tables from worker-reported status.

use serde::{Deserialize, Serialize};

use super::entity::Issue;
use crate::domain::media::QcProcessingStatus;

/// Lifecycle status of a QC project.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcStatus {
    /// Project exists but has never been initiated.
    #[default]
    Created,
    /// A QC run was requested and is waiting for the worker.
    Pending,
    /// The worker is analysing the asset.
    Processing,
    /// Analysis finished without issues.
    Approved,
    /// Analysis finished and reported at least one issue.
    Rejected,
    /// The worker reported a failure.
    Failed,
    /// The request could not be handed to a worker.
    DispatchFailed,
}

impl QcStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
            Self::DispatchFailed => "DISPATCH_FAILED",
        }
    }

    /// Parse from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "FAILED" => Some(Self::Failed),
            "DISPATCH_FAILED" => Some(Self::DispatchFailed),
            _ => None,
        }
    }

    /// Check if this is a terminal status for the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Failed | Self::DispatchFailed
        )
    }
}

/// Status reported by the external QC worker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Initiated,
    Progress,
    Complete,
    Failed,
}

impl WorkerStatus {
    /// Project status implied by a worker report.
    ///
    /// A completed run is approved only when it produced no issues.
    pub fn project_status(&self, issues: &[Issue]) -> QcStatus {
        match self {
            Self::Initiated => QcStatus::Pending,
            Self::Progress => QcStatus::Processing,
            Self::Complete if issues.is_empty() => QcStatus::Approved,
            Self::Complete => QcStatus::Rejected,
            Self::Failed => QcStatus::Failed,
        }
    }

    /// Raw media QC mirror status implied by a worker report.
    pub fn media_status(&self) -> QcProcessingStatus {
        match self {
            Self::Initiated => QcProcessingStatus::QcProcessingInitiated,
            Self::Progress => QcProcessingStatus::QcProcessingInProgress,
            Self::Complete => QcProcessingStatus::QcProcessingComplete,
            Self::Failed => QcProcessingStatus::QcProcessingFailed,
        }
    }
}
