use std::sync::Arc;

use tracing::{debug, info, warn};

use super::events::{ProgressEvent, QcRequestEvent};
use super::{MAX_PER_PAGE, QcConfig};
use crate::api::jwt::JwtService;
use crate::database::models::{Pagination, QcProjectFilters};
use crate::database::repositories::{QcProjectRepository, RawMediaRepository};
use crate::domain::{
    HistoryEntry, Issue, QcMirror, QcProcessingStatus, QcProgressType, QcProject, QcStatus,
    RawMedia, UploadStatus,
};
use crate::queue::MessageQueue;
use crate::storage::{CompletedPart, ObjectStorage, parse_url_to_bucket_and_key};
use crate::{Error, Result};

/// Compare-and-set retries before a progress event gives up.
const MAX_TRANSITION_RETRIES: usize = 5;

/// What `initiate` published.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateOutcome {
    pub project_id: String,
    pub topic: String,
    pub no_of_attempts: u32,
    pub event: QcRequestEvent,
}

/// Result of reconciling one progress event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    pub project_id: String,
    pub status: QcStatus,
    /// A history entry was appended.
    pub transitioned: bool,
    /// The raw media QC mirror was written.
    pub mirror_updated: bool,
}

/// QC progress as seen by the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub status: QcStatus,
    pub qc_status: Option<QcProcessingStatus>,
    pub qc_progress_type: Option<QcProgressType>,
    pub qc_progress: Option<f64>,
    pub issues: Vec<Issue>,
}

/// One page of an owner's projects.
#[derive(Debug, Clone)]
pub struct ProjectPage {
    pub items: Vec<QcProject>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl ProjectPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page.max(1)))
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Owner of the QC project state machine.
pub struct QcService {
    projects: Arc<dyn QcProjectRepository>,
    media: Arc<dyn RawMediaRepository>,
    queue: Arc<dyn MessageQueue>,
    storage: Arc<dyn ObjectStorage>,
    jwt: Arc<JwtService>,
    config: QcConfig,
}

impl QcService {
    pub fn new(
        projects: Arc<dyn QcProjectRepository>,
        media: Arc<dyn RawMediaRepository>,
        queue: Arc<dyn MessageQueue>,
        storage: Arc<dyn ObjectStorage>,
        jwt: Arc<JwtService>,
        config: QcConfig,
    ) -> Self {
        Self {
            projects,
            media,
            queue,
            storage,
            jwt,
            config,
        }
    }

    pub fn config(&self) -> &QcConfig {
        &self.config
    }

    /// Fetch a project visible to `owner_id`.
    async fn owned_project(&self, owner_id: &str, project_id: &str) -> Result<QcProject> {
        let project = self.projects.get(project_id).await?;
        if project.created_by != owner_id {
            // Other owners' projects are indistinguishable from missing ones.
            return Err(Error::not_found("QcProject", project_id));
        }
        Ok(project)
    }

    /// Create a project in `CREATED`.
    ///
    /// When `raw_media_id` is given the media must exist, and its destination
    /// becomes the project's video URL.
    pub async fn create_project(
        &self,
        owner_id: &str,
        project_id: &str,
        raw_media_id: Option<String>,
    ) -> Result<QcProject> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(Error::validation("projectId must not be empty"));
        }

        let mut project = QcProject::new(owner_id, project_id, None);
        if let Some(raw_media_id) = raw_media_id.filter(|id| !id.trim().is_empty()) {
            let media = self.media.get(&raw_media_id).await?;
            project.raw_media_id = Some(media.id);
            project.video_url = Some(media.destination.url);
        }

        self.projects.create(&project).await?;
        info!(project_id, owner_id, "Created QC project");
        Ok(project)
    }

    /// Start a new QC attempt and publish its request event.
    ///
    /// Preconditions are checked before anything is written, so a project
    /// without an attached asset keeps its attempt count and publishes nothing.
    pub async fn initiate(&self, project_id: &str) -> Result<InitiateOutcome> {
        let project = self.projects.get(project_id).await?;

        let raw_media_id = match (&project.raw_media_id, &project.video_url) {
            (Some(raw_media_id), Some(_)) => raw_media_id.clone(),
            _ => {
                warn!(project_id, "Cannot initiate QC without an attached asset");
                return Err(Error::not_found("QcProject asset", project_id));
            }
        };

        let media = self.media.get(&raw_media_id).await?;
        let location = parse_url_to_bucket_and_key(&media.destination.url)?;
        let token = self
            .jwt
            .generate_worker_token(project_id)
            .map_err(|e| Error::Other(format!("failed to mint worker token: {e}")))?;

        let entry = HistoryEntry::new(
            QcStatus::Pending,
            project.issues.clone(),
            Some(raw_media_id.clone()),
        );
        let attempt = self.projects.begin_attempt(project_id, &entry).await?;

        let event = QcRequestEvent {
            project_id: project_id.to_string(),
            progress_base_url: self.config.progress_base_url.clone(),
            s3_bucket: location.bucket,
            s3_file_key: location.key,
            s3_region: self.config.s3_region.clone(),
            token,
            attempt,
        };

        let payload = serde_json::to_string(&event)?;
        let message_id = self
            .queue
            .publish(&self.config.request_topic, project_id, payload)
            .await?;

        info!(
            project_id,
            attempt,
            raw_media_id = %raw_media_id,
            bucket = %event.s3_bucket,
            key = %event.s3_file_key,
            message_id = %message_id,
            "Initiated QC run"
        );

        Ok(InitiateOutcome {
            project_id: project_id.to_string(),
            topic: self.config.request_topic.clone(),
            no_of_attempts: attempt,
            event,
        })
    }

    /// Fold one worker report into the project and raw media records.
    ///
    /// Re-applying the same event is a no-op, and reports for a superseded
    /// attempt are rejected without writing anything.
    pub async fn handle_progress(&self, event: &ProgressEvent) -> Result<ProgressOutcome> {
        let next_status = event.status.project_status(&event.issues);
        let media_status = event.status.media_status();

        for _ in 0..MAX_TRANSITION_RETRIES {
            let project = self.projects.get(&event.project_id).await?;
            let raw_media_id = project
                .raw_media_id
                .clone()
                .ok_or_else(|| Error::not_found("RawMedia", format!("of project {}", project.project_id)))?;
            let media = self.media.get(&raw_media_id).await?;

            if project.is_stale_attempt(event.attempt) {
                let attempt = event.attempt.unwrap_or_default();
                warn!(
                    project_id = %project.project_id,
                    attempt,
                    current = project.no_of_attempts,
                    "Rejecting progress for a superseded attempt"
                );
                return Err(Error::StaleAttempt {
                    project_id: project.project_id,
                    attempt,
                    current: project.no_of_attempts,
                });
            }
            if let Some(attempt) = event.attempt
                && attempt > project.no_of_attempts
            {
                return Err(Error::validation(format!(
                    "attempt {attempt} has not been initiated (current {})",
                    project.no_of_attempts
                )));
            }

            let attempts = project.no_of_attempts;
            let transitioned = match project.transition_entry(next_status, &event.issues) {
                Some(entry) => {
                    if !self
                        .projects
                        .transition(&project.project_id, project.status, attempts, &entry)
                        .await?
                    {
                        debug!(project_id = %project.project_id, "Project changed underneath, reloading");
                        continue;
                    }
                    info!(
                        project_id = %project.project_id,
                        from = %project.status,
                        to = %next_status,
                        attempt = attempts,
                        "QC status changed"
                    );
                    true
                }
                None => {
                    if project.issues != event.issues
                        && !self
                            .projects
                            .update_issues(&project.project_id, attempts, &event.issues)
                            .await?
                    {
                        continue;
                    }
                    false
                }
            };

            let mirror = QcMirror {
                qc_status: Some(media_status),
                qc_progress_type: event.progress_type.or(media.qc.qc_progress_type),
                qc_progress: event.progress_percentage.or(media.qc.qc_progress),
            };
            let mirror_updated = mirror != media.qc;
            if mirror_updated {
                self.media.update_qc_mirror(&media.id, &mirror).await?;
            }

            return Ok(ProgressOutcome {
                project_id: project.project_id,
                status: next_status,
                transitioned,
                mirror_updated,
            });
        }

        Err(Error::Other(format!(
            "project {} kept changing while applying progress",
            event.project_id
        )))
    }

    /// Record upload progress and keep the project's asset in sync.
    ///
    /// `video_url` defaults to the raw media's destination.
    pub async fn handle_upload_progress(
        &self,
        owner_id: &str,
        project_id: &str,
        raw_media_id: &str,
        status: UploadStatus,
        progress: Option<f64>,
        video_url: Option<String>,
    ) -> Result<QcProject> {
        if let Some(p) = progress
            && !(0.0..=100.0).contains(&p)
        {
            return Err(Error::validation(format!(
                "progress must be within 0..=100, got {p}"
            )));
        }

        let project = self.owned_project(owner_id, project_id).await?;
        let media = self.media.get(raw_media_id).await?;
        let video_url = video_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| media.destination.url.clone());

        if project.raw_media_id.as_deref() != Some(raw_media_id)
            || project.video_url.as_deref() != Some(video_url.as_str())
        {
            self.projects
                .attach_media(project_id, raw_media_id, Some(&video_url))
                .await?;
            info!(project_id, raw_media_id, "Attached asset to QC project");
        }

        self.media
            .update_upload_progress(raw_media_id, status, progress)
            .await?;

        self.projects.get(project_id).await
    }

    /// Finalize a raw media multipart upload and mark it completed.
    pub async fn complete_multipart_upload(
        &self,
        raw_media_id: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<RawMedia> {
        if upload_id.trim().is_empty() {
            return Err(Error::validation("uploadId must not be empty"));
        }
        if parts.is_empty() {
            return Err(Error::validation("parts must not be empty"));
        }
        let media = self.media.get(raw_media_id).await?;
        let location = parse_url_to_bucket_and_key(&media.destination.url)?;

        self.storage
            .complete_multipart_upload(&location.bucket, &location.key, upload_id, parts)
            .await?;
        self.media
            .update_upload_progress(raw_media_id, UploadStatus::Completed, Some(100.0))
            .await?;

        info!(
            raw_media_id,
            upload_id,
            parts = parts.len(),
            "Completed multipart upload"
        );
        self.media.get(raw_media_id).await
    }

    /// Owner-scoped page of projects.
    pub async fn list(
        &self,
        owner_id: &str,
        filters: &QcProjectFilters,
        page: u32,
        per_page: u32,
    ) -> Result<ProjectPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let (items, total) = self
            .projects
            .list(owner_id, filters, &Pagination::from_page(page, per_page))
            .await?;

        Ok(ProjectPage {
            items,
            total,
            page,
            per_page,
        })
    }

    pub async fn get(&self, owner_id: &str, project_id: &str) -> Result<QcProject> {
        self.owned_project(owner_id, project_id).await
    }

    /// Current QC progress of a project.
    pub async fn progress(&self, owner_id: &str, project_id: &str) -> Result<ProgressSnapshot> {
        let project = self.owned_project(owner_id, project_id).await?;
        let mirror = match &project.raw_media_id {
            Some(raw_media_id) => self.media.get(raw_media_id).await?.qc,
            None => QcMirror::default(),
        };

        Ok(ProgressSnapshot {
            status: project.status,
            qc_status: mirror.qc_status,
            qc_progress_type: mirror.qc_progress_type,
            qc_progress: mirror.qc_progress,
            issues: project.issues,
        })
    }

    /// Whether `attempt` is still the project's latest attempt.
    pub async fn is_current_attempt(&self, project_id: &str, attempt: u32) -> Result<bool> {
        Ok(self.projects.get(project_id).await?.no_of_attempts == attempt)
    }

    /// Record that the request for `attempt` could not be dispatched.
    ///
    /// Applies only while that attempt is current and still `PENDING`.
    pub async fn mark_dispatch_failed(&self, project_id: &str, attempt: u32) -> Result<bool> {
        let project = self.projects.get(project_id).await?;
        if project.no_of_attempts != attempt || project.status != QcStatus::Pending {
            info!(
                project_id,
                attempt,
                current = project.no_of_attempts,
                status = %project.status,
                "Ignoring dispatch failure for a superseded request"
            );
            return Ok(false);
        }

        let Some(entry) = project.transition_entry(QcStatus::DispatchFailed, &project.issues) else {
            return Ok(false);
        };
        let applied = self
            .projects
            .transition(project_id, QcStatus::Pending, attempt, &entry)
            .await?;
        if applied {
            warn!(project_id, attempt, "QC request could not be dispatched");
        }
        Ok(applied)
    }

    /// Store the launched task id for `attempt`.
    pub async fn record_dispatch(
        &self,
        project_id: &str,
        attempt: u32,
        task_id: &str,
    ) -> Result<bool> {
        let recorded = self
            .projects
            .set_qc_request_id(project_id, attempt, task_id)
            .await?;
        if !recorded {
            debug!(project_id, attempt, task_id, "Attempt superseded before task id was recorded");
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::database::repositories::{SqlxQcProjectRepository, SqlxRawMediaRepository};
    use crate::database::{init_pool_with_size, run_migrations};
    use crate::domain::WorkerStatus;
    use crate::queue::Consumer;
    use crate::storage::MemoryObjectStorage;

    /// Queue that records publishes without delivering them.
    #[derive(Default)]
    struct RecordingQueue {
        published: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl MessageQueue for RecordingQueue {
        async fn publish(&self, topic: &str, key: &str, payload: String) -> Result<String> {
            self.published
                .lock()
                .push((topic.to_string(), key.to_string(), payload));
            Ok(uuid::Uuid::new_v4().to_string())
        }

        async fn subscribe(
            &self,
            _topic: &str,
            _group: &str,
            _consumer: Arc<dyn Consumer>,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// Counts QC mirror writes on top of a real repository.
    struct CountingMedia {
        inner: SqlxRawMediaRepository,
        mirror_writes: AtomicUsize,
    }

    #[async_trait]
    impl RawMediaRepository for CountingMedia {
        async fn get(&self, id: &str) -> Result<RawMedia> {
            self.inner.get(id).await
        }
        async fn create(&self, media: &RawMedia) -> Result<()> {
            self.inner.create(media).await
        }
        async fn update_qc_mirror(&self, id: &str, mirror: &QcMirror) -> Result<()> {
            self.mirror_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.update_qc_mirror(id, mirror).await
        }
        async fn update_upload_progress(
            &self,
            id: &str,
            status: UploadStatus,
            progress: Option<f64>,
        ) -> Result<()> {
            self.inner.update_upload_progress(id, status, progress).await
        }
    }

    struct Harness {
        service: QcService,
        media: Arc<CountingMedia>,
        queue: Arc<RecordingQueue>,
        storage: Arc<MemoryObjectStorage>,
    }

    async fn harness() -> Harness {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let media = Arc::new(CountingMedia {
            inner: SqlxRawMediaRepository::new(pool.clone()),
            mirror_writes: AtomicUsize::new(0),
        });
        let queue = Arc::new(RecordingQueue::default());
        let storage = Arc::new(MemoryObjectStorage::new());
        let service = QcService::new(
            Arc::new(SqlxQcProjectRepository::new(pool)),
            media.clone(),
            queue.clone(),
            storage.clone(),
            Arc::new(JwtService::new(
                "test-secret-key-32-chars-long!!",
                "video-qc",
                "video-qc-api",
                600,
            )),
            QcConfig::default(),
        );

        media
            .create(&RawMedia::new("m1", "s3://media-raw/uploads/clip.mp4"))
            .await
            .unwrap();

        Harness {
            service,
            media,
            queue,
            storage,
        }
    }

    async fn ready_project(h: &Harness, project_id: &str) {
        h.service
            .create_project("owner-1", project_id, Some("m1".to_string()))
            .await
            .unwrap();
    }

    fn progress(status: WorkerStatus, issues: Vec<Issue>, attempt: Option<u32>) -> ProgressEvent {
        ProgressEvent {
            project_id: "p1".to_string(),
            status,
            progress_percentage: Some(50.0),
            progress_type: Some(QcProgressType::Analysis),
            issues,
            attempt,
        }
    }

    fn issue() -> Issue {
        Issue {
            category: "BLACK_FRAME".to_string(),
            start: 3.0,
            end: 4.5,
            duration: 1.5,
        }
    }

    #[tokio::test]
    async fn test_create_project_with_media_sets_video_url() {
        let h = harness().await;
        let project = h
            .service
            .create_project("owner-1", "p1", Some("m1".to_string()))
            .await
            .unwrap();

        assert_eq!(project.status, QcStatus::Created);
        assert_eq!(project.no_of_attempts, 0);
        assert!(project.history.is_empty());
        assert_eq!(
            project.video_url.as_deref(),
            Some("s3://media-raw/uploads/clip.mp4")
        );
    }

    #[tokio::test]
    async fn test_create_duplicate_is_already_exists() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        let err = h
            .service
            .create_project("owner-2", "p1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_id_and_unknown_media() {
        let h = harness().await;
        assert!(matches!(
            h.service.create_project("owner-1", "  ", None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            h.service
                .create_project("owner-1", "p2", Some("missing".to_string()))
                .await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_initiate_requires_asset_and_publishes_nothing() {
        let h = harness().await;
        h.service
            .create_project("owner-1", "p1", None)
            .await
            .unwrap();

        let err = h.service.initiate("p1").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(h.queue.published.lock().is_empty());

        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.no_of_attempts, 0);
        assert_eq!(project.status, QcStatus::Created);
    }

    #[tokio::test]
    async fn test_initiate_unknown_project_is_not_found() {
        let h = harness().await;
        assert!(matches!(
            h.service.initiate("nope").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_initiate_publishes_request_event() {
        let h = harness().await;
        ready_project(&h, "p1").await;

        let outcome = h.service.initiate("p1").await.unwrap();
        assert_eq!(outcome.topic, "qc-requested");
        assert_eq!(outcome.no_of_attempts, 1);
        assert_eq!(outcome.event.s3_bucket, "media-raw");
        assert_eq!(outcome.event.s3_file_key, "uploads/clip.mp4");
        assert_eq!(outcome.event.attempt, 1);

        let published = h.queue.published.lock().clone();
        assert_eq!(published.len(), 1);
        let (topic, key, payload) = &published[0];
        assert_eq!(topic, "qc-requested");
        assert_eq!(key, "p1");
        let event: QcRequestEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event, outcome.event);

        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::Pending);
        assert_eq!(project.history.len(), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_monotonic() {
        let h = harness().await;
        ready_project(&h, "p1").await;

        for _ in 0..4 {
            h.service.initiate("p1").await.unwrap();
        }

        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.no_of_attempts, 4);
        // Consecutive PENDING entries collapse.
        assert_eq!(project.history.len(), 1);
        assert_eq!(h.queue.published.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_duplicate_progress_appends_one_history_entry() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        let event = progress(WorkerStatus::Progress, Vec::new(), Some(1));
        let first = h.service.handle_progress(&event).await.unwrap();
        let second = h.service.handle_progress(&event).await.unwrap();

        assert!(first.transitioned);
        assert!(!second.transitioned);
        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::Processing);
        assert_eq!(project.history.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_mirror_is_not_rewritten() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        let event = progress(WorkerStatus::Progress, Vec::new(), None);
        let first = h.service.handle_progress(&event).await.unwrap();
        assert!(first.mirror_updated);
        assert_eq!(h.media.mirror_writes.load(Ordering::SeqCst), 1);

        let second = h.service.handle_progress(&event).await.unwrap();
        assert!(!second.mirror_updated);
        assert_eq!(h.media.mirror_writes.load(Ordering::SeqCst), 1);

        let mut further = event.clone();
        further.progress_percentage = Some(75.0);
        h.service.handle_progress(&further).await.unwrap();
        assert_eq!(h.media.mirror_writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_complete_with_issues_is_rejected() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        let outcome = h
            .service
            .handle_progress(&progress(WorkerStatus::Complete, vec![issue()], Some(1)))
            .await
            .unwrap();
        assert_eq!(outcome.status, QcStatus::Rejected);

        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.issues, vec![issue()]);
        assert_eq!(project.history.last().unwrap().issues, vec![issue()]);

        let media = h.media.get("m1").await.unwrap();
        assert_eq!(
            media.qc.qc_status,
            Some(QcProcessingStatus::QcProcessingComplete)
        );
    }

    #[tokio::test]
    async fn test_issue_snapshot_updates_without_transition() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        h.service
            .handle_progress(&progress(WorkerStatus::Progress, Vec::new(), Some(1)))
            .await
            .unwrap();
        let outcome = h
            .service
            .handle_progress(&progress(WorkerStatus::Progress, vec![issue()], Some(1)))
            .await
            .unwrap();

        assert!(!outcome.transitioned);
        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.issues, vec![issue()]);
        assert_eq!(project.history.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_attempt_is_rejected_without_writes() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();
        h.service.initiate("p1").await.unwrap();

        let err = h
            .service
            .handle_progress(&progress(WorkerStatus::Complete, Vec::new(), Some(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::StaleAttempt {
                attempt: 1,
                current: 2,
                ..
            }
        ));

        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::Pending);
        assert_eq!(h.media.mirror_writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_future_attempt_is_validation_error() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        assert!(matches!(
            h.service
                .handle_progress(&progress(WorkerStatus::Progress, Vec::new(), Some(5)))
                .await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_progress_for_unknown_project_or_media() {
        let h = harness().await;
        assert!(matches!(
            h.service
                .handle_progress(&progress(WorkerStatus::Progress, Vec::new(), None))
                .await,
            Err(Error::NotFound { .. })
        ));

        h.service
            .create_project("owner-1", "p1", None)
            .await
            .unwrap();
        assert!(matches!(
            h.service
                .handle_progress(&progress(WorkerStatus::Progress, Vec::new(), None))
                .await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_end_to_end_approval() {
        let h = harness().await;
        h.service
            .create_project("owner-1", "p1", None)
            .await
            .unwrap();
        h.service
            .handle_upload_progress(
                "owner-1",
                "p1",
                "m1",
                UploadStatus::Completed,
                Some(100.0),
                None,
            )
            .await
            .unwrap();
        h.service.initiate("p1").await.unwrap();
        h.service
            .handle_progress(&progress(WorkerStatus::Progress, Vec::new(), Some(1)))
            .await
            .unwrap();
        h.service
            .handle_progress(&progress(WorkerStatus::Complete, Vec::new(), Some(1)))
            .await
            .unwrap();

        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::Approved);
        let statuses: Vec<QcStatus> = project.history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![QcStatus::Pending, QcStatus::Processing, QcStatus::Approved]
        );
    }

    #[tokio::test]
    async fn test_upload_progress_attaches_asset() {
        let h = harness().await;
        h.service
            .create_project("owner-1", "p1", None)
            .await
            .unwrap();

        let project = h
            .service
            .handle_upload_progress(
                "owner-1",
                "p1",
                "m1",
                UploadStatus::InProgress,
                Some(40.0),
                Some("https://cdn.example.com/clip.mp4".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(project.raw_media_id.as_deref(), Some("m1"));
        assert_eq!(
            project.video_url.as_deref(),
            Some("https://cdn.example.com/clip.mp4")
        );

        let media = h.media.get("m1").await.unwrap();
        assert_eq!(media.upload_status, UploadStatus::InProgress);
        assert_eq!(media.upload_progress, 40.0);

        assert!(matches!(
            h.service
                .handle_upload_progress("owner-2", "p1", "m1", UploadStatus::InProgress, None, None)
                .await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            h.service
                .handle_upload_progress("owner-1", "p1", "m9", UploadStatus::InProgress, None, None)
                .await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            h.service
                .handle_upload_progress("owner-1", "p1", "m1", UploadStatus::InProgress, Some(140.0), None)
                .await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_clamps_and_paginates() {
        let h = harness().await;
        for i in 0..5 {
            h.service
                .create_project("owner-1", &format!("p{i}"), None)
                .await
                .unwrap();
        }

        let page = h
            .service
            .list("owner-1", &QcProjectFilters::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next_page());

        let page = h
            .service
            .list("owner-1", &QcProjectFilters::default(), 0, 1000)
            .await
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, MAX_PER_PAGE);
        assert!(!page.has_next_page());

        let other = h
            .service
            .list("owner-2", &QcProjectFilters::default(), 1, 10)
            .await
            .unwrap();
        assert_eq!(other.total, 0);
        assert_eq!(other.total_pages(), 0);
    }

    #[tokio::test]
    async fn test_get_is_owner_scoped() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        assert!(matches!(
            h.service.get("owner-2", "p1").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_progress_snapshot() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();
        h.service
            .handle_progress(&progress(WorkerStatus::Progress, vec![issue()], Some(1)))
            .await
            .unwrap();

        let snapshot = h.service.progress("owner-1", "p1").await.unwrap();
        assert_eq!(snapshot.status, QcStatus::Processing);
        assert_eq!(
            snapshot.qc_status,
            Some(QcProcessingStatus::QcProcessingInProgress)
        );
        assert_eq!(snapshot.qc_progress_type, Some(QcProgressType::Analysis));
        assert_eq!(snapshot.qc_progress, Some(50.0));
        assert_eq!(snapshot.issues, vec![issue()]);
    }

    #[tokio::test]
    async fn test_dispatch_failure_for_current_attempt() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        assert!(h.service.mark_dispatch_failed("p1", 1).await.unwrap());
        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::DispatchFailed);
        assert_eq!(project.history.len(), 2);

        // Re-initiating recovers.
        h.service.initiate("p1").await.unwrap();
        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::Pending);
    }

    #[tokio::test]
    async fn test_dispatch_failure_for_stale_attempt_is_ignored() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();
        h.service.initiate("p1").await.unwrap();

        assert!(!h.service.mark_dispatch_failed("p1", 1).await.unwrap());
        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.status, QcStatus::Pending);
    }

    #[tokio::test]
    async fn test_record_dispatch_only_for_current_attempt() {
        let h = harness().await;
        ready_project(&h, "p1").await;
        h.service.initiate("p1").await.unwrap();

        assert!(h.service.record_dispatch("p1", 1, "task-1").await.unwrap());
        assert!(!h.service.record_dispatch("p1", 7, "task-7").await.unwrap());
        let project = h.service.get("owner-1", "p1").await.unwrap();
        assert_eq!(project.qc_request_id.as_deref(), Some("task-1"));
    }

    #[tokio::test]
    async fn test_complete_multipart_upload_marks_completed() {
        let h = harness().await;
        let parts = vec![CompletedPart {
            part_number: 1,
            e_tag: "\"etag\"".to_string(),
        }];

        let media = h
            .service
            .complete_multipart_upload("m1", "upload-1", &parts)
            .await
            .unwrap();
        assert_eq!(media.upload_status, UploadStatus::Completed);
        assert_eq!(media.upload_progress, 100.0);

        let completed = h.storage.completed_uploads();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, "media-raw");
        assert_eq!(completed[0].1, "uploads/clip.mp4");
    }
}
