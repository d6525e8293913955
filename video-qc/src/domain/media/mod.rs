//! Raw media entities.
//!
//! Raw media records are owned by the ingestion subsystem. This service only
//! reads their destination and maintains the upload and QC mirror fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// QC status mirrored onto the raw media record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcProcessingStatus {
    QcProcessingInitiated,
    QcProcessingInProgress,
    QcProcessingComplete,
    QcProcessingFailed,
}

impl QcProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QcProcessingInitiated => "QC_PROCESSING_INITIATED",
            Self::QcProcessingInProgress => "QC_PROCESSING_IN_PROGRESS",
            Self::QcProcessingComplete => "QC_PROCESSING_COMPLETE",
            Self::QcProcessingFailed => "QC_PROCESSING_FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QC_PROCESSING_INITIATED" => Some(Self::QcProcessingInitiated),
            "QC_PROCESSING_IN_PROGRESS" => Some(Self::QcProcessingInProgress),
            "QC_PROCESSING_COMPLETE" => Some(Self::QcProcessingComplete),
            "QC_PROCESSING_FAILED" => Some(Self::QcProcessingFailed),
            _ => None,
        }
    }
}

/// Worker phase tag attached to QC progress.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcProgressType {
    #[serde(alias = "download")]
    Download,
    #[serde(alias = "analysis")]
    Analysis,
    #[serde(alias = "upload")]
    Upload,
}

impl QcProgressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "DOWNLOAD",
            Self::Analysis => "ANALYSIS",
            Self::Upload => "UPLOAD",
        }
    }
}

/// Upload bookkeeping status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

/// The QC mirror triple. Written only when it differs from what is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcMirror {
    pub qc_status: Option<QcProcessingStatus>,
    pub qc_progress_type: Option<QcProgressType>,
    pub qc_progress: Option<f64>,
}

/// Where the uploaded asset lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub url: String,
}

/// The uploaded file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedia {
    pub id: String,
    pub destination: Destination,
    pub upload_status: UploadStatus,
    pub upload_progress: f64,
    pub qc: QcMirror,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RawMedia {
    pub fn new(id: impl Into<String>, destination_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            destination: Destination {
                url: destination_url.into(),
            },
            upload_status: UploadStatus::Pending,
            upload_progress: 0.0,
            qc: QcMirror::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
