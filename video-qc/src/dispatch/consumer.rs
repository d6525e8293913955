//! Consumer of the QC request topic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::resources::{SizingConfig, TaskResources};
use crate::Result;
use crate::launcher::TaskLauncher;
use crate::qc::{QcRequestEvent, QcService};
use crate::queue::{Consumer, QueueMessage};
use crate::storage::ObjectStorage;

/// Sizes and launches one worker task per QC request.
pub struct QcRequestConsumer {
    service: Arc<QcService>,
    storage: Arc<dyn ObjectStorage>,
    launcher: Arc<dyn TaskLauncher>,
    sizing: SizingConfig,
    messages: AtomicU64,
}

impl QcRequestConsumer {
    pub fn new(
        service: Arc<QcService>,
        storage: Arc<dyn ObjectStorage>,
        launcher: Arc<dyn TaskLauncher>,
        sizing: SizingConfig,
    ) -> Self {
        Self {
            service,
            storage,
            launcher,
            sizing,
            messages: AtomicU64::new(0),
        }
    }

    /// Messages received so far, redeliveries included.
    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Size and launch the worker for `event`. `None` when the attempt is superseded.
    async fn dispatch(&self, event: &QcRequestEvent) -> Result<Option<(String, TaskResources)>> {
        if !self
            .service
            .is_current_attempt(&event.project_id, event.attempt)
            .await?
        {
            return Ok(None);
        }

        let size_gb = self
            .storage
            .object_size_gb(&event.s3_bucket, &event.s3_file_key)
            .await?;
        let disk_mb = self
            .storage
            .disk_allocation_mb(&event.s3_bucket, &event.s3_file_key, self.sizing.max_disk_mb)
            .await?;
        let resources = self.sizing.resolve(size_gb, disk_mb);

        let task_id = self.launcher.launch(event, &resources).await?;
        self.service
            .record_dispatch(&event.project_id, event.attempt, &task_id)
            .await?;
        Ok(Some((task_id, resources)))
    }
}

#[async_trait]
impl Consumer for QcRequestConsumer {
    async fn consume(&self, message: &QueueMessage) -> bool {
        let count = self.messages.fetch_add(1, Ordering::Relaxed) + 1;

        let event: QcRequestEvent = match serde_json::from_str(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(
                    message_count = count,
                    message_id = %message.id,
                    delivery = message.delivery,
                    "Unreadable QC request: {}",
                    e
                );
                return false;
            }
        };

        match self.dispatch(&event).await {
            Ok(Some((task_id, resources))) => {
                info!(
                    message_count = count,
                    project_id = %event.project_id,
                    attempt = event.attempt,
                    tier = %resources.tier,
                    disk_mb = resources.ephemeral_disk_mb,
                    task_id = %task_id,
                    "Dispatched QC request"
                );
                true
            }
            Ok(None) => {
                info!(
                    message_count = count,
                    project_id = %event.project_id,
                    attempt = event.attempt,
                    "Skipping QC request for a superseded attempt"
                );
                true
            }
            Err(e) => {
                error!(
                    message_count = count,
                    project_id = %event.project_id,
                    attempt = event.attempt,
                    delivery = message.delivery,
                    "Failed to dispatch QC request: {}",
                    e
                );
                false
            }
        }
    }

    async fn on_dead_letter(&self, message: &QueueMessage) {
        let event: QcRequestEvent = match serde_json::from_str(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(message_id = %message.id, "Dropping unreadable dead-lettered QC request: {}", e);
                return;
            }
        };

        match self
            .service
            .mark_dispatch_failed(&event.project_id, event.attempt)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                project_id = %event.project_id,
                attempt = event.attempt,
                "Dead-lettered QC request no longer current"
            ),
            Err(e) => error!(
                project_id = %event.project_id,
                attempt = event.attempt,
                "Failed to record dispatch failure: {}",
                e
            ),
        }
    }
}
