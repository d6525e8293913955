//! Service container for dependency injection.
//!
//! The ServiceContainer builds every collaborator from [`AppConfig`], wires
//! them together and manages their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::api::jwt::JwtService;
use crate::api::middleware::InternalSecretAuth;
use crate::api::server::AppState;
use crate::config::AppConfig;
use crate::database::repositories::{SqlxQcProjectRepository, SqlxRawMediaRepository};
use crate::dispatch::QcRequestConsumer;
use crate::launcher::{HttpTaskLauncher, LocalTaskLauncher, TaskLauncher};
use crate::qc::QcService;
use crate::queue::{InMemoryQueue, MessageQueue};
use crate::storage::{HttpObjectStorage, ObjectStorage};

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: SqlitePool,
    pub qc_service: Arc<QcService>,
    pub jwt_service: Arc<JwtService>,
    pub queue: Arc<InMemoryQueue>,
    /// Dispatches `qc-requested` messages to the task launcher.
    pub consumer: Arc<QcRequestConsumer>,
    internal_auth: InternalSecretAuth,
    request_topic: String,
    consumer_group: String,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Create a container with storage and launcher built from `config`.
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        let storage: Arc<dyn ObjectStorage> =
            Arc::new(HttpObjectStorage::new(config.storage.clone()));

        let launcher: Arc<dyn TaskLauncher> = if config.launcher.dev_local_execution {
            info!(
                program = %config.launcher.local_program,
                "Local execution enabled, QC workers run as child processes"
            );
            Arc::new(LocalTaskLauncher::new(&config.launcher))
        } else {
            Arc::new(HttpTaskLauncher::new(config.launcher.clone()))
        };

        Self::with_components(pool, config, storage, launcher)
    }

    /// Create a container around explicit storage and launcher implementations.
    pub fn with_components(
        pool: SqlitePool,
        config: &AppConfig,
        storage: Arc<dyn ObjectStorage>,
        launcher: Arc<dyn TaskLauncher>,
    ) -> Self {
        info!("Initializing service container");

        let cancellation_token = CancellationToken::new();

        let projects = Arc::new(SqlxQcProjectRepository::new(pool.clone()));
        let media = Arc::new(SqlxRawMediaRepository::new(pool.clone()));
        let queue = Arc::new(InMemoryQueue::new(
            config.queue.clone(),
            cancellation_token.child_token(),
        ));
        let jwt_service = Arc::new(JwtService::from_config(&config.auth));

        let qc_service = Arc::new(QcService::new(
            projects,
            media,
            queue.clone(),
            storage.clone(),
            jwt_service.clone(),
            config.qc.clone(),
        ));

        let consumer = Arc::new(QcRequestConsumer::new(
            qc_service.clone(),
            storage,
            launcher,
            config.sizing.clone(),
        ));

        info!("Service container initialized");

        Self {
            pool,
            qc_service,
            jwt_service,
            queue,
            consumer,
            internal_auth: InternalSecretAuth::new(config.auth.internal_secret.clone()),
            request_topic: config.qc.request_topic.clone(),
            consumer_group: config.qc.consumer_group.clone(),
            cancellation_token,
        }
    }

    /// Subscribe the dispatch consumer to the request topic.
    pub async fn initialize(&self) -> Result<()> {
        self.queue
            .subscribe(
                &self.request_topic,
                &self.consumer_group,
                self.consumer.clone(),
            )
            .await?;
        info!(
            topic = %self.request_topic,
            group = %self.consumer_group,
            "QC request consumer started"
        );
        Ok(())
    }

    /// Shared state for the API server.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.jwt_service.clone(),
            self.internal_auth.clone(),
            self.qc_service.clone(),
        )
        .with_db_pool(self.pool.clone())
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);

        // Stops queue partitions and pending redeliveries.
        self.cancellation_token.cancel();

        let dead_letters = self.queue.dead_letters().len();
        if dead_letters > 0 {
            warn!(count = dead_letters, "Dead-lettered QC requests at shutdown");
        }

        if tokio::time::timeout(timeout, self.pool.close()).await.is_err() {
            warn!("Shutdown timeout reached while closing database pool");
        }

        info!("Services shut down");
        Ok(())
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
