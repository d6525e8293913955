//! API request and response DTOs.
//!
//! Wire names are camelCase throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    HistoryEntry, Issue, QcProcessingStatus, QcProgressType, QcProject, QcStatus, RawMedia,
    UploadStatus,
};
use crate::qc::{InitiateOutcome, ProgressOutcome, ProgressSnapshot, ProjectPage};
use crate::storage::CompletedPart;

// ============================================================================
// Pagination
// ============================================================================

/// Query parameters for the project list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsQuery {
    pub project_id: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Page-numbered list response.
///
/// ```json
/// { "items": [...], "total": 41, "page": 2, "perPage": 20, "totalPages": 3, "hasNextPage": true }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
    pub has_next_page: bool,
}

impl From<ProjectPage> for PaginatedResponse<ProjectSummary> {
    fn from(page: ProjectPage) -> Self {
        Self {
            total_pages: page.total_pages(),
            has_next_page: page.has_next_page(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            items: page.items.into_iter().map(ProjectSummary::from).collect(),
        }
    }
}

// ============================================================================
// Project DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub project_id: String,
    pub raw_media_id: Option<String>,
}

/// Project with its full history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub project_id: String,
    pub raw_media_id: Option<String>,
    pub video_url: Option<String>,
    pub status: QcStatus,
    pub issues: Vec<Issue>,
    pub history: Vec<HistoryEntry>,
    pub no_of_attempts: u32,
    pub qc_request_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QcProject> for ProjectDetail {
    fn from(p: QcProject) -> Self {
        Self {
            project_id: p.project_id,
            raw_media_id: p.raw_media_id,
            video_url: p.video_url,
            status: p.status,
            issues: p.issues,
            history: p.history,
            no_of_attempts: p.no_of_attempts,
            qc_request_id: p.qc_request_id,
            created_by: p.created_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// List entry; history is omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_id: String,
    pub raw_media_id: Option<String>,
    pub video_url: Option<String>,
    pub status: QcStatus,
    pub issues: Vec<Issue>,
    pub no_of_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QcProject> for ProjectSummary {
    fn from(p: QcProject) -> Self {
        Self {
            project_id: p.project_id,
            raw_media_id: p.raw_media_id,
            video_url: p.video_url,
            status: p.status,
            issues: p.issues,
            no_of_attempts: p.no_of_attempts,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

// ============================================================================
// QC run DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub project_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub project_id: String,
    pub topic: String,
    pub no_of_attempts: u32,
}

impl From<InitiateOutcome> for InitiateResponse {
    fn from(o: InitiateOutcome) -> Self {
        Self {
            project_id: o.project_id,
            topic: o.topic,
            no_of_attempts: o.no_of_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressAck {
    pub project_id: String,
    pub status: QcStatus,
    pub transitioned: bool,
}

impl From<ProgressOutcome> for ProgressAck {
    fn from(o: ProgressOutcome) -> Self {
        Self {
            project_id: o.project_id,
            status: o.status,
            transitioned: o.transitioned,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshotResponse {
    pub status: QcStatus,
    pub qc_status: Option<QcProcessingStatus>,
    pub qc_progress_type: Option<QcProgressType>,
    pub qc_progress: Option<f64>,
    pub issues: Vec<Issue>,
}

impl From<ProgressSnapshot> for ProgressSnapshotResponse {
    fn from(s: ProgressSnapshot) -> Self {
        Self {
            status: s.status,
            qc_status: s.qc_status,
            qc_progress_type: s.qc_progress_type,
            qc_progress: s.qc_progress,
            issues: s.issues,
        }
    }
}

// ============================================================================
// Upload DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgressRequest {
    pub project_id: String,
    pub raw_media_id: String,
    pub status: UploadStatus,
    pub progress: Option<f64>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartUploadRequest {
    pub raw_media_id: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaResponse {
    pub id: String,
    pub destination_url: String,
    pub upload_status: UploadStatus,
    pub upload_progress: f64,
}

impl From<RawMedia> for RawMediaResponse {
    fn from(m: RawMedia) -> Self {
        Self {
            id: m.id,
            destination_url: m.destination.url,
            upload_status: m.upload_status,
            upload_progress: m.upload_progress,
        }
    }
}

// ============================================================================
// Health DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query: ListProjectsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 20);
        assert!(query.status.is_none());
    }

    #[test]
    fn test_summary_omits_history() {
        let project = QcProject::new("owner-1", "p1", None);
        let json = serde_json::to_value(ProjectSummary::from(project)).unwrap();
        assert!(json.get("history").is_none());
        assert_eq!(json["projectId"], "p1");
        assert_eq!(json["status"], "CREATED");
    }

    #[test]
    fn test_paginated_response_from_page() {
        let page = ProjectPage {
            items: vec![QcProject::new("o", "a", None)],
            total: 41,
            page: 2,
            per_page: 20,
        };
        let response = PaginatedResponse::from(page);
        assert_eq!(response.total_pages, 3);
        assert!(response.has_next_page);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["perPage"], 20);
        assert_eq!(json["hasNextPage"], true);
    }
}
