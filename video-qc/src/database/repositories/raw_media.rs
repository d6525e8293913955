//! Raw media repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::RawMediaDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::domain::{QcMirror, RawMedia, UploadStatus};
use crate::{Error, Result};

/// Raw media repository trait.
#[async_trait]
pub trait RawMediaRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<RawMedia>;
    /// Register a raw media record. Normally done by the ingestion subsystem.
    async fn create(&self, media: &RawMedia) -> Result<()>;
    /// Persist the QC mirror triple.
    async fn update_qc_mirror(&self, id: &str, mirror: &QcMirror) -> Result<()>;
    /// Persist upload bookkeeping. `progress` of `None` keeps the stored value.
    async fn update_upload_progress(
        &self,
        id: &str,
        status: UploadStatus,
        progress: Option<f64>,
    ) -> Result<()>;
}

/// SQLx implementation of RawMediaRepository.
pub struct SqlxRawMediaRepository {
    pool: SqlitePool,
}

impl SqlxRawMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawMediaRepository for SqlxRawMediaRepository {
    async fn get(&self, id: &str) -> Result<RawMedia> {
        sqlx::query_as::<_, RawMediaDbModel>("SELECT * FROM raw_media WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("RawMedia", id))?
            .try_into()
    }

    async fn create(&self, media: &RawMedia) -> Result<()> {
        let model = RawMediaDbModel::from_entity(media);
        let result = sqlx::query(
            r#"
            INSERT INTO raw_media (
                id, destination_url, upload_status, upload_progress,
                qc_status, qc_progress_type, qc_progress, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.destination_url)
        .bind(&model.upload_status)
        .bind(model.upload_progress)
        .bind(&model.qc_status)
        .bind(&model.qc_progress_type)
        .bind(model.qc_progress)
        .bind(&model.created_at)
        .bind(&model.updated_at)
        .execute(&self.pool)
        .await;

        match result.map_err(Error::from) {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => Err(Error::already_exists("RawMedia", &model.id)),
            Err(e) => Err(e),
        }
    }

    async fn update_qc_mirror(&self, id: &str, mirror: &QcMirror) -> Result<()> {
        let qc_status = mirror.qc_status.map(|s| s.as_str());
        let qc_progress_type = mirror.qc_progress_type.map(|t| t.as_str());
        let qc_progress = mirror.qc_progress;
        let pool = &self.pool;
        retry_on_sqlite_busy("raw_media.update_qc_mirror", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            let result = sqlx::query(
                r#"
                UPDATE raw_media SET
                    qc_status = ?,
                    qc_progress_type = ?,
                    qc_progress = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(qc_status)
            .bind(qc_progress_type)
            .bind(qc_progress)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::not_found("RawMedia", id));
            }
            Ok(())
        })
        .await
    }

    async fn update_upload_progress(
        &self,
        id: &str,
        status: UploadStatus,
        progress: Option<f64>,
    ) -> Result<()> {
        let pool = &self.pool;
        retry_on_sqlite_busy("raw_media.update_upload_progress", move || async move {
            let now = chrono::Utc::now().to_rfc3339();
            let result = sqlx::query(
                r#"
                UPDATE raw_media SET
                    upload_status = ?,
                    upload_progress = COALESCE(?, upload_progress),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(progress)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::not_found("RawMedia", id));
            }
            Ok(())
        })
        .await
    }
}
