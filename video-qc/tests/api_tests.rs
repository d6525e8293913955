//! HTTP-level tests for the video QC API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` against an
//! in-memory SQLite database, in-memory object storage and a recording task
//! launcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use video_qc::Result;
use video_qc::api::ApiServer;
use video_qc::api::middleware::INTERNAL_SECRET_HEADER;
use video_qc::config::AppConfig;
use video_qc::database::repositories::{RawMediaRepository, SqlxRawMediaRepository};
use video_qc::database::{init_pool_with_size, run_migrations};
use video_qc::dispatch::TaskResources;
use video_qc::domain::RawMedia;
use video_qc::launcher::TaskLauncher;
use video_qc::qc::QcRequestEvent;
use video_qc::services::ServiceContainer;
use video_qc::storage::MemoryObjectStorage;

const OWNER: &str = "owner-1";
const INTERNAL_SECRET: &str = "internal-secret";
const MEDIA_URL: &str = "s3://raw-media/uploads/clip.mp4";

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<(QcRequestEvent, TaskResources)>>,
}

#[async_trait]
impl TaskLauncher for RecordingLauncher {
    async fn launch(&self, event: &QcRequestEvent, resources: &TaskResources) -> Result<String> {
        self.launched.lock().push((event.clone(), *resources));
        Ok(format!("task-{}-{}", event.project_id, event.attempt))
    }
}

struct TestApp {
    router: Router,
    container: ServiceContainer,
    launcher: Arc<RecordingLauncher>,
    user_token: String,
}

impl TestApp {
    async fn new() -> Self {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let media = SqlxRawMediaRepository::new(pool.clone());
        media
            .create(&RawMedia::new("media-1", MEDIA_URL))
            .await
            .unwrap();

        let storage = Arc::new(MemoryObjectStorage::new());
        storage.put_object("raw-media", "uploads/clip.mp4", 3 * 1024 * 1024 * 1024);

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-test-secret".to_string();
        config.auth.internal_secret = INTERNAL_SECRET.to_string();

        let launcher = Arc::new(RecordingLauncher::default());
        let container =
            ServiceContainer::with_components(pool, &config, storage, launcher.clone());
        container.initialize().await.unwrap();

        let router = ApiServer::new(
            config.server.clone(),
            container.app_state(),
            CancellationToken::new(),
        )
        .build_router();

        let user_token = container
            .jwt_service
            .generate_token(OWNER, vec![], 3600)
            .unwrap();

        Self {
            router,
            container,
            launcher,
            user_token,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn user(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let bearer = format!("Bearer {}", self.user_token);
        self.send(json_request(method, uri, body, &[(header::AUTHORIZATION.as_str(), bearer.as_str())]))
            .await
    }

    async fn internal(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(
            Method::POST,
            uri,
            Some(body),
            &[(INTERNAL_SECRET_HEADER, INTERNAL_SECRET)],
        ))
        .await
    }

    async fn worker(&self, token: &str, body: Value) -> (StatusCode, Value) {
        let bearer = format!("Bearer {token}");
        self.send(json_request(
            Method::POST,
            "/video-qc/progress",
            Some(body),
            &[(header::AUTHORIZATION.as_str(), bearer.as_str())],
        ))
        .await
    }

    /// Create `p1`, report its upload and initiate a run.
    async fn initiated_project(&self) -> QcRequestEvent {
        let (status, _) = self
            .user(
                Method::POST,
                "/video-qc",
                Some(json!({ "projectId": "p1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = self
            .user(
                Method::POST,
                "/video-qc/report-upload-progress",
                Some(json!({
                    "projectId": "p1",
                    "rawMediaId": "media-1",
                    "status": "COMPLETED",
                    "progress": 100.0
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .internal("/video-qc/initiate", json!({ "projectId": "p1" }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["noOfAttempts"], 1);
        assert_eq!(body["topic"], "qc-requested");

        self.wait_for_launches(1).await
    }

    async fn wait_for_launches(&self, count: usize) -> QcRequestEvent {
        for _ in 0..100 {
            if let Some((event, _)) = self.launcher.launched.lock().get(count - 1) {
                return event.clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("worker launch {count} was never dispatched");
    }
}

fn json_request(
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn qc_run_end_to_end() {
    let app = TestApp::new().await;
    let event = app.initiated_project().await;

    assert_eq!(event.project_id, "p1");
    assert_eq!(event.s3_bucket, "raw-media");
    assert_eq!(event.s3_file_key, "uploads/clip.mp4");
    assert_eq!(event.attempt, 1);

    let (status, body) = app
        .worker(
            &event.token,
            json!({
                "projectId": "p1",
                "status": "PROGRESS",
                "progressPercentage": 40.0,
                "progressType": "ANALYSIS",
                "attempt": 1
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "PROCESSING");
    assert_eq!(body["transitioned"], true);

    let (status, body) = app
        .worker(
            &event.token,
            json!({ "projectId": "p1", "status": "COMPLETE", "issues": [], "attempt": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "APPROVED");

    let (status, body) = app.user(Method::GET, "/video-qc/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["rawMediaId"], "media-1");
    assert_eq!(body["videoUrl"], MEDIA_URL);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["status"], "PENDING");
    assert_eq!(history[1]["status"], "PROCESSING");
    assert_eq!(history[2]["status"], "APPROVED");

    let (status, body) = app.user(Method::GET, "/video-qc/progress/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["qcStatus"], "QC_PROCESSING_COMPLETE");
    assert_eq!(body["qcProgress"], 40.0);
    assert_eq!(body["qcProgressType"], "ANALYSIS");
}

#[tokio::test]
async fn dispatch_records_task_and_sizes_worker() {
    let app = TestApp::new().await;
    app.initiated_project().await;

    let resources = app.launcher.launched.lock()[0].1;
    // 3 GiB lands in the medium tier.
    assert_eq!(resources.tier.to_string(), "MEDIUM");
    assert_eq!(resources.ephemeral_disk_mb, 21 * 1024);

    let mut recorded = None;
    for _ in 0..100 {
        let project = app.container.qc_service.get(OWNER, "p1").await.unwrap();
        if project.qc_request_id.is_some() {
            recorded = project.qc_request_id;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(recorded.as_deref(), Some("task-p1-1"));
}

#[tokio::test]
async fn list_is_paginated_and_filtered() {
    let app = TestApp::new().await;
    for id in ["a", "b", "c"] {
        let (status, _) = app
            .user(Method::POST, "/video-qc", Some(json!({ "projectId": id })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .user(Method::GET, "/video-qc?page=1&perPage=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["hasNextPage"], true);

    let (status, body) = app
        .user(Method::GET, "/video-qc?status=CREATED&projectId=b", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["projectId"], "b");

    let (status, body) = app.user(Method::GET, "/video-qc?status=BOGUS", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn create_conflicts_and_missing_projects() {
    let app = TestApp::new().await;
    let body = json!({ "projectId": "dup", "rawMediaId": "media-1" });

    let (status, created) = app.user(Method::POST, "/video-qc", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["videoUrl"], MEDIA_URL);

    let (status, _) = app.user(Method::POST, "/video-qc", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.user(Method::GET, "/video-qc/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .user(
            Method::POST,
            "/video-qc",
            Some(json!({ "projectId": "x", "rawMediaId": "missing-media" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn initiate_without_asset_is_rejected() {
    let app = TestApp::new().await;
    app.user(Method::POST, "/video-qc", Some(json!({ "projectId": "bare" })))
        .await;

    let (status, _) = app
        .internal("/video-qc/initiate", json!({ "projectId": "bare" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let project = app.container.qc_service.get(OWNER, "bare").await.unwrap();
    assert_eq!(project.no_of_attempts, 0);
    assert!(project.history.is_empty());
}

#[tokio::test]
async fn auth_is_enforced_per_endpoint() {
    let app = TestApp::new().await;
    let event = app.initiated_project().await;

    // Owner endpoints need a user token.
    let (status, _) = app
        .send(json_request(Method::GET, "/video-qc/p1", None, &[]))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Worker tokens cannot read owner endpoints.
    let bearer = format!("Bearer {}", event.token);
    let (status, _) = app
        .send(json_request(
            Method::GET,
            "/video-qc/p1",
            None,
            &[(header::AUTHORIZATION.as_str(), bearer.as_str())],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Initiate needs the internal secret.
    let (status, _) = app
        .user(
            Method::POST,
            "/video-qc/initiate",
            Some(json!({ "projectId": "p1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/video-qc/initiate",
            Some(json!({ "projectId": "p1" })),
            &[(INTERNAL_SECRET_HEADER, "wrong")],
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A worker token only covers its own project.
    let (status, _) = app
        .worker(
            &event.token,
            json!({ "projectId": "other", "status": "PROGRESS" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // User tokens are not worker tokens.
    let (status, _) = app
        .worker(
            &app.user_token,
            json!({ "projectId": "p1", "status": "PROGRESS" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The internal secret may report for any project.
    let (status, _) = app
        .internal(
            "/video-qc/progress",
            json!({ "projectId": "p1", "status": "PROGRESS" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn superseded_attempt_progress_is_rejected() {
    let app = TestApp::new().await;
    let first = app.initiated_project().await;

    let (status, body) = app
        .internal("/video-qc/initiate", json!({ "projectId": "p1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["noOfAttempts"], 2);

    let (status, body) = app
        .worker(
            &first.token,
            json!({ "projectId": "p1", "status": "COMPLETE", "attempt": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STALE_ATTEMPT");

    let project = app.container.qc_service.get(OWNER, "p1").await.unwrap();
    assert_eq!(project.status.to_string(), "PENDING");
}

#[tokio::test]
async fn upload_progress_is_validated() {
    let app = TestApp::new().await;
    app.user(Method::POST, "/video-qc", Some(json!({ "projectId": "u1" })))
        .await;

    let (status, _) = app
        .user(
            Method::POST,
            "/video-qc/report-upload-progress",
            Some(json!({
                "projectId": "u1",
                "rawMediaId": "media-1",
                "status": "IN_PROGRESS",
                "progress": 140.0
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .user(
            Method::POST,
            "/video-qc/report-upload-progress",
            Some(json!({
                "projectId": "u1",
                "rawMediaId": "media-1",
                "status": "IN_PROGRESS",
                "progress": 55.0,
                "videoUrl": "https://cdn.example.com/clip.mp4"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videoUrl"], "https://cdn.example.com/clip.mp4");
    assert_eq!(body["rawMediaId"], "media-1");
}

#[tokio::test]
async fn complete_multipart_upload_marks_media_completed() {
    let app = TestApp::new().await;

    let (status, body) = app
        .user(
            Method::POST,
            "/video-qc/complete-multipart-upload",
            Some(json!({
                "rawMediaId": "media-1",
                "uploadId": "upload-1",
                "parts": [
                    { "partNumber": 2, "eTag": "\"b\"" },
                    { "partNumber": 1, "eTag": "\"a\"" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["uploadStatus"], "COMPLETED");
    assert_eq!(body["uploadProgress"], 100.0);

    let (status, _) = app
        .user(
            Method::POST,
            "/video-qc/complete-multipart-upload",
            Some(json!({ "rawMediaId": "media-1", "uploadId": "upload-2", "parts": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(json_request(Method::GET, "/health", None, &[]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"][0]["name"], "database");

    let (status, _) = app
        .send(json_request(Method::GET, "/health/ready", None, &[]))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(json_request(Method::GET, "/health/live", None, &[]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}
