//! QC project routes.
//!
//! Owner endpoints use user bearer auth. `initiate` is internal only and the
//! progress webhook accepts either the internal secret or the run's worker
//! token.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::jwt::Claims;
use crate::api::middleware::{
    Caller, internal_auth_middleware, internal_or_worker_auth_middleware, user_auth_middleware,
};
use crate::api::models::{
    CompleteMultipartUploadRequest, CreateProjectRequest, InitiateRequest, InitiateResponse,
    ListProjectsQuery, PaginatedResponse, ProgressAck, ProgressSnapshotResponse, ProjectDetail,
    ProjectSummary, RawMediaResponse, UploadProgressRequest,
};
use crate::api::server::AppState;
use crate::database::models::QcProjectFilters;
use crate::domain::QcStatus;
use crate::qc::ProgressEvent;

/// Create the video QC router.
pub fn router(state: AppState) -> Router<AppState> {
    let user = Router::new()
        .route("/", post(create_project).get(list_projects))
        .route("/{id}", get(get_project))
        .route("/progress/{project_id}", get(get_progress))
        .route("/report-upload-progress", post(report_upload_progress))
        .route("/complete-multipart-upload", post(complete_multipart_upload))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            user_auth_middleware,
        ));

    let internal = Router::new()
        .route("/initiate", post(initiate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            internal_auth_middleware,
        ));

    let webhook = Router::new()
        .route("/progress", post(report_progress))
        .route_layer(middleware::from_fn_with_state(
            state,
            internal_or_worker_auth_middleware,
        ));

    user.merge(internal).merge(webhook)
}

async fn create_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectDetail>)> {
    let project = state
        .qc_service
        .create_project(&claims.sub, &request.project_id, request.raw_media_id)
        .await?;
    Ok((StatusCode::CREATED, Json(project.into())))
}

async fn get_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectDetail>> {
    let project = state.qc_service.get(&claims.sub, &id).await?;
    Ok(Json(project.into()))
}

async fn list_projects(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<PaginatedResponse<ProjectSummary>>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            QcStatus::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("Unknown status '{}'", raw)))?,
        ),
        None => None,
    };
    let filters = QcProjectFilters {
        project_id: query.project_id.filter(|id| !id.is_empty()),
        status,
    };

    let page = state
        .qc_service
        .list(&claims.sub, &filters, query.page, query.per_page)
        .await?;
    Ok(Json(page.into()))
}

async fn get_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ProgressSnapshotResponse>> {
    let snapshot = state.qc_service.progress(&claims.sub, &project_id).await?;
    Ok(Json(snapshot.into()))
}

async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<InitiateRequest>,
) -> ApiResult<Json<InitiateResponse>> {
    let outcome = state.qc_service.initiate(&request.project_id).await?;
    Ok(Json(outcome.into()))
}

async fn report_progress(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(event): Json<ProgressEvent>,
) -> ApiResult<Json<ProgressAck>> {
    if !caller.may_access(&event.project_id) {
        return Err(ApiError::forbidden(
            "Worker token does not cover this project",
        ));
    }
    let outcome = state.qc_service.handle_progress(&event).await?;
    Ok(Json(outcome.into()))
}

async fn report_upload_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<UploadProgressRequest>,
) -> ApiResult<Json<ProjectDetail>> {
    let project = state
        .qc_service
        .handle_upload_progress(
            &claims.sub,
            &request.project_id,
            &request.raw_media_id,
            request.status,
            request.progress,
            request.video_url,
        )
        .await?;
    Ok(Json(project.into()))
}

async fn complete_multipart_upload(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(request): Json<CompleteMultipartUploadRequest>,
) -> ApiResult<Json<RawMediaResponse>> {
    let media = state
        .qc_service
        .complete_multipart_upload(&request.raw_media_id, &request.upload_id, &request.parts)
        .await?;
    Ok(Json(media.into()))
}
