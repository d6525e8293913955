//! QC project database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::{HistoryEntry, Issue, QcProject, QcStatus};
use crate::{Error, Result};

/// QC project database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QcProjectDbModel {
    pub project_id: String,
    pub raw_media_id: Option<String>,
    pub video_url: Option<String>,
    /// Status: CREATED, PENDING, PROCESSING, APPROVED, REJECTED, FAILED, DISPATCH_FAILED
    pub status: String,
    /// JSON array of issues (latest snapshot)
    pub issues: String,
    /// JSON array of history entries
    pub history: String,
    pub no_of_attempts: i64,
    pub qc_request_id: Option<String>,
    pub created_by: String,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
}

fn parse_timestamp(project_id: &str, field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::Other(format!(
                "invalid {} '{}' on qc project {}: {}",
                field, value, project_id, e
            ))
        })
}

impl TryFrom<QcProjectDbModel> for QcProject {
    type Error = Error;

    fn try_from(model: QcProjectDbModel) -> Result<Self> {
        let status = QcStatus::parse(&model.status).ok_or_else(|| {
            Error::Other(format!(
                "unknown status '{}' on qc project {}",
                model.status, model.project_id
            ))
        })?;
        let issues: Vec<Issue> = serde_json::from_str(&model.issues)?;
        let history: Vec<HistoryEntry> = serde_json::from_str(&model.history)?;
        let created_at = parse_timestamp(&model.project_id, "created_at", &model.created_at)?;
        let updated_at = parse_timestamp(&model.project_id, "updated_at", &model.updated_at)?;

        Ok(Self {
            project_id: model.project_id,
            raw_media_id: model.raw_media_id,
            video_url: model.video_url,
            status,
            issues,
            history,
            no_of_attempts: u32::try_from(model.no_of_attempts).unwrap_or(0),
            qc_request_id: model.qc_request_id,
            created_by: model.created_by,
            created_at,
            updated_at,
        })
    }
}

impl TryFrom<&QcProject> for QcProjectDbModel {
    type Error = Error;

    fn try_from(project: &QcProject) -> Result<Self> {
        Ok(Self {
            project_id: project.project_id.clone(),
            raw_media_id: project.raw_media_id.clone(),
            video_url: project.video_url.clone(),
            status: project.status.as_str().to_string(),
            issues: serde_json::to_string(&project.issues)?,
            history: serde_json::to_string(&project.history)?,
            no_of_attempts: i64::from(project.no_of_attempts),
            qc_request_id: project.qc_request_id.clone(),
            created_by: project.created_by.clone(),
            created_at: project.created_at.to_rfc3339(),
            updated_at: project.updated_at.to_rfc3339(),
        })
    }
}

/// Filters for listing QC projects.
#[derive(Debug, Clone, Default)]
pub struct QcProjectFilters {
    pub project_id: Option<String>,
    pub status: Option<QcStatus>,
}
