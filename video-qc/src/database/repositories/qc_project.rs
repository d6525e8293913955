//! QC project repository.
//!
//! Every mutating method is a single SQL statement, so each one is atomic on
//! its own. State transitions use compare-and-set on `(status, no_of_attempts)`
//! and history is appended in place with `json_insert`, which keeps progress
//! reconciliation safe to re-run without a cross-document transaction.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{Pagination, QcProjectDbModel, QcProjectFilters};
use crate::database::retry::retry_on_sqlite_busy;
use crate::domain::{HistoryEntry, Issue, QcProject, QcStatus};
use crate::{Error, Result};

/// QC project repository trait.
#[async_trait]
pub trait QcProjectRepository: Send + Sync {
    /// Fetch a project, failing with `NotFound` when absent.
    async fn get(&self, project_id: &str) -> Result<QcProject>;
    /// Insert a new project. Fails with `AlreadyExists` on a duplicate id.
    async fn create(&self, project: &QcProject) -> Result<()>;
    /// Owner-scoped filtered page plus the total match count.
    async fn list(
        &self,
        owner_id: &str,
        filters: &QcProjectFilters,
        pagination: &Pagination,
    ) -> Result<(Vec<QcProject>, u64)>;
    /// Set the attached asset.
    async fn attach_media(
        &self,
        project_id: &str,
        raw_media_id: &str,
        video_url: Option<&str>,
    ) -> Result<()>;
    /// Atomically bump the attempt counter and move to `PENDING`.
    ///
    /// `entry` is appended to history only if the stored status was not
    /// already `PENDING`. Returns the new attempt count.
    async fn begin_attempt(&self, project_id: &str, entry: &HistoryEntry) -> Result<u32>;
    /// Compare-and-set status transition.
    ///
    /// Applies only if the stored row still has `expected_status` and
    /// `expected_attempts`. Returns whether the row was updated.
    async fn transition(
        &self,
        project_id: &str,
        expected_status: QcStatus,
        expected_attempts: u32,
        entry: &HistoryEntry,
    ) -> Result<bool>;
    /// Overwrite the latest issue snapshot for the given attempt.
    async fn update_issues(
        &self,
        project_id: &str,
        expected_attempts: u32,
        issues: &[Issue],
    ) -> Result<bool>;
    /// Record the external task id for the given attempt.
    async fn set_qc_request_id(
        &self,
        project_id: &str,
        expected_attempts: u32,
        qc_request_id: &str,
    ) -> Result<bool>;
}

/// SQLx implementation of QcProjectRepository.
pub struct SqlxQcProjectRepository {
    pool: SqlitePool,
}

impl SqlxQcProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QcProjectRepository for SqlxQcProjectRepository {
    async fn get(&self, project_id: &str) -> Result<QcProject> {
        sqlx::query_as::<_, QcProjectDbModel>("SELECT * FROM qc_projects WHERE project_id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("QcProject", project_id))?
            .try_into()
    }

    async fn create(&self, project: &QcProject) -> Result<()> {
        let model = QcProjectDbModel::try_from(project)?;
        let result = sqlx::query(
            r#"
            INSERT INTO qc_projects (
                project_id, raw_media_id, video_url, status, issues, history,
                no_of_attempts, qc_request_id, created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.project_id)
        .bind(&model.raw_media_id)
        .bind(&model.video_url)
        .bind(&model.status)
        .bind(&model.issues)
        .bind(&model.history)
        .bind(model.no_of_attempts)
        .bind(&model.qc_request_id)
        .bind(&model.created_by)
        .bind(&model.created_at)
        .bind(&model.updated_at)
        .execute(&self.pool)
        .await;

        match result.map_err(Error::from) {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => {
                Err(Error::already_exists("QcProject", &model.project_id))
            }
            Err(e) => Err(e),
        }
    }

    async fn list(
        &self,
        owner_id: &str,
        filters: &QcProjectFilters,
        pagination: &Pagination,
    ) -> Result<(Vec<QcProject>, u64)> {
        let mut conditions = vec!["created_by = ?".to_string()];
        if filters.project_id.is_some() {
            conditions.push("project_id = ?".to_string());
        }
        if filters.status.is_some() {
            conditions.push("status = ?".to_string());
        }
        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_sql = format!("SELECT COUNT(*) FROM qc_projects {}", where_clause);
        let data_sql = format!(
            "SELECT * FROM qc_projects {} ORDER BY created_at DESC, project_id LIMIT ? OFFSET ?",
            where_clause
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(owner_id);
        if let Some(ref project_id) = filters.project_id {
            count_query = count_query.bind(project_id);
        }
        if let Some(status) = filters.status {
            count_query = count_query.bind(status.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await? as u64;

        let mut data_query = sqlx::query_as::<_, QcProjectDbModel>(&data_sql).bind(owner_id);
        if let Some(ref project_id) = filters.project_id {
            data_query = data_query.bind(project_id);
        }
        if let Some(status) = filters.status {
            data_query = data_query.bind(status.as_str());
        }
        data_query = data_query
            .bind(pagination.limit as i64)
            .bind(pagination.offset as i64);

        let projects = data_query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(QcProject::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((projects, total))
    }

    async fn attach_media(
        &self,
        project_id: &str,
        raw_media_id: &str,
        video_url: Option<&str>,
    ) -> Result<()> {
        let pool = &self.pool;
        retry_on_sqlite_busy("qc_project.attach_media", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            let result = sqlx::query(
                r#"
                UPDATE qc_projects SET
                    raw_media_id = ?,
                    video_url = COALESCE(?, video_url),
                    updated_at = ?
                WHERE project_id = ?
                "#,
            )
            .bind(raw_media_id)
            .bind(video_url)
            .bind(&now)
            .bind(project_id)
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::not_found("QcProject", project_id));
            }
            Ok(())
        })
        .await
    }

    async fn begin_attempt(&self, project_id: &str, entry: &HistoryEntry) -> Result<u32> {
        let entry_json = serde_json::to_string(entry)?;
        let entry_json = entry_json.as_str();
        let pool = &self.pool;
        retry_on_sqlite_busy("qc_project.begin_attempt", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            // SET expressions see the pre-update row, so the CASE reads the old status.
            let attempts: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE qc_projects SET
                    no_of_attempts = no_of_attempts + 1,
                    history = CASE
                        WHEN status = 'PENDING' THEN history
                        ELSE json_insert(history, '$[#]', json(?))
                    END,
                    status = 'PENDING',
                    updated_at = ?
                WHERE project_id = ?
                RETURNING no_of_attempts
                "#,
            )
            .bind(entry_json)
            .bind(&now)
            .bind(project_id)
            .fetch_optional(pool)
            .await?;

            attempts
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .ok_or_else(|| Error::not_found("QcProject", project_id))
        })
        .await
    }

    async fn transition(
        &self,
        project_id: &str,
        expected_status: QcStatus,
        expected_attempts: u32,
        entry: &HistoryEntry,
    ) -> Result<bool> {
        let entry_json = serde_json::to_string(entry)?;
        let issues_json = serde_json::to_string(&entry.issues)?;
        let (entry_json, issues_json) = (entry_json.as_str(), issues_json.as_str());
        let pool = &self.pool;
        retry_on_sqlite_busy("qc_project.transition", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            let result = sqlx::query(
                r#"
                UPDATE qc_projects SET
                    status = ?,
                    issues = ?,
                    history = json_insert(history, '$[#]', json(?)),
                    updated_at = ?
                WHERE project_id = ? AND status = ? AND no_of_attempts = ?
                "#,
            )
            .bind(entry.status.as_str())
            .bind(issues_json)
            .bind(entry_json)
            .bind(&now)
            .bind(project_id)
            .bind(expected_status.as_str())
            .bind(i64::from(expected_attempts))
            .execute(pool)
            .await?;
            Ok(result.rows_affected() == 1)
        })
        .await
    }

    async fn update_issues(
        &self,
        project_id: &str,
        expected_attempts: u32,
        issues: &[Issue],
    ) -> Result<bool> {
        let issues_json = serde_json::to_string(issues)?;
        let issues_json = issues_json.as_str();
        let pool = &self.pool;
        retry_on_sqlite_busy("qc_project.update_issues", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            let result = sqlx::query(
                r#"
                UPDATE qc_projects SET issues = ?, updated_at = ?
                WHERE project_id = ? AND no_of_attempts = ?
                "#,
            )
            .bind(issues_json)
            .bind(&now)
            .bind(project_id)
            .bind(i64::from(expected_attempts))
            .execute(pool)
            .await?;
            Ok(result.rows_affected() == 1)
        })
        .await
    }

    async fn set_qc_request_id(
        &self,
        project_id: &str,
        expected_attempts: u32,
        qc_request_id: &str,
    ) -> Result<bool> {
        let pool = &self.pool;
        retry_on_sqlite_busy("qc_project.set_qc_request_id", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            let result = sqlx::query(
                r#"
                UPDATE qc_projects SET qc_request_id = ?, updated_at = ?
                WHERE project_id = ? AND no_of_attempts = ?
                "#,
            )
            .bind(qc_request_id)
            .bind(&now)
            .bind(project_id)
            .bind(i64::from(expected_attempts))
            .execute(pool)
            .await?;
            Ok(result.rows_affected() == 1)
        })
        .await
    }
}
