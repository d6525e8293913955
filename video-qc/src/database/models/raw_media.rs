//! Raw media database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::media::Destination;
use crate::domain::{QcMirror, QcProcessingStatus, QcProgressType, RawMedia, UploadStatus};
use crate::{Error, Result};

/// Raw media database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RawMediaDbModel {
    pub id: String,
    pub destination_url: String,
    pub upload_status: String,
    pub upload_progress: f64,
    pub qc_status: Option<String>,
    pub qc_progress_type: Option<String>,
    pub qc_progress: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl RawMediaDbModel {
    pub fn from_entity(media: &RawMedia) -> Self {
        Self {
            id: media.id.clone(),
            destination_url: media.destination.url.clone(),
            upload_status: media.upload_status.as_str().to_string(),
            upload_progress: media.upload_progress,
            qc_status: media.qc.qc_status.map(|s| s.as_str().to_string()),
            qc_progress_type: media.qc.qc_progress_type.map(|t| t.as_str().to_string()),
            qc_progress: media.qc.qc_progress,
            created_at: media.created_at.to_rfc3339(),
            updated_at: media.updated_at.to_rfc3339(),
        }
    }
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("invalid timestamp on raw media {}: {}", id, e)))
}

impl TryFrom<RawMediaDbModel> for RawMedia {
    type Error = Error;

    fn try_from(model: RawMediaDbModel) -> Result<Self> {
        let upload_status = UploadStatus::from_str(&model.upload_status).map_err(|_| {
            Error::Other(format!(
                "unknown upload status '{}' on raw media {}",
                model.upload_status, model.id
            ))
        })?;
        // Unknown mirror values are treated as unset so a fresh write replaces them.
        let qc = QcMirror {
            qc_status: model.qc_status.as_deref().and_then(QcProcessingStatus::parse),
            qc_progress_type: model
                .qc_progress_type
                .as_deref()
                .and_then(|s| QcProgressType::from_str(s).ok()),
            qc_progress: model.qc_progress,
        };

        Ok(Self {
            created_at: parse_timestamp(&model.id, &model.created_at)?,
            updated_at: parse_timestamp(&model.id, &model.updated_at)?,
            id: model.id,
            destination: Destination {
                url: model.destination_url,
            },
            upload_status,
            upload_progress: model.upload_progress,
            qc,
        })
    }
}
