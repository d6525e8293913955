//! Control-plane launcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use super::{LauncherConfig, TaskLauncher};
use crate::dispatch::resources::TaskResources;
use crate::qc::events::QcRequestEvent;
use crate::utils::http_client::build_client;
use crate::{Error, Result};

const RUN_TASK_TARGET: &str = "AmazonEC2ContainerServiceV20141113.RunTask";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunTaskResponse {
    #[serde(default)]
    tasks: Vec<LaunchedTask>,
    #[serde(default)]
    failures: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaunchedTask {
    task_arn: Option<String>,
}

/// Launches one task per request through the control plane's RunTask API.
pub struct HttpTaskLauncher {
    client: reqwest::Client,
    config: LauncherConfig,
}

impl HttpTaskLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        let client = build_client(
            Duration::from_secs(config.request_timeout_secs),
            concat!("video-qc/", env!("CARGO_PKG_VERSION")),
        );
        Self { client, config }
    }

    /// RunTask request body for `event` sized by `resources`.
    pub fn run_task_request(
        &self,
        event: &QcRequestEvent,
        resources: &TaskResources,
    ) -> Result<Value> {
        let payload = serde_json::to_string(event)?;
        let assign_public_ip = if self.config.assign_public_ip {
            "ENABLED"
        } else {
            "DISABLED"
        };

        Ok(json!({
            "cluster": self.config.cluster,
            "taskDefinition": self.config.task_definition,
            "count": 1,
            "capacityProviderStrategy": [
                { "capacityProvider": self.config.capacity_provider, "weight": 1 }
            ],
            "networkConfiguration": {
                "awsvpcConfiguration": {
                    "subnets": self.config.subnets,
                    "securityGroups": self.config.security_groups,
                    "assignPublicIp": assign_public_ip,
                }
            },
            "overrides": {
                "cpu": resources.cpu_units.to_string(),
                "memory": resources.memory_mb.to_string(),
                "ephemeralStorage": { "sizeInGiB": resources.ephemeral_disk_mb.div_ceil(1024) },
                "containerOverrides": [{
                    "name": self.config.container_name,
                    "command": [payload],
                    "cpu": resources.cpu_units,
                    "memory": resources.memory_mb,
                }]
            },
            "startedBy": format!("video-qc/{}", event.project_id),
        }))
    }
}

#[async_trait]
impl TaskLauncher for HttpTaskLauncher {
    async fn launch(&self, event: &QcRequestEvent, resources: &TaskResources) -> Result<String> {
        let body = self.run_task_request(event, resources)?;

        let mut request = self
            .client
            .post(&self.config.control_plane_endpoint)
            .header(header::CONTENT_TYPE, "application/x-amz-json-1.1")
            .header("X-Amz-Target", RUN_TASK_TARGET)
            .json(&body);
        if let Some(token) = &self.config.control_plane_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        let task_id = if status.is_success() {
            serde_json::from_str::<RunTaskResponse>(&text)
                .ok()
                .and_then(|r| {
                    if !r.failures.is_empty() {
                        error!(
                            project_id = %event.project_id,
                            failures = ?r.failures,
                            "Control plane reported task failures"
                        );
                    }
                    r.tasks.into_iter().find_map(|t| t.task_arn)
                })
        } else {
            None
        };

        match task_id {
            Some(task_id) => {
                info!(
                    project_id = %event.project_id,
                    attempt = event.attempt,
                    tier = %resources.tier,
                    task_id = %task_id,
                    "Launched QC worker task"
                );
                Ok(task_id)
            }
            None => {
                error!(
                    project_id = %event.project_id,
                    bucket = %event.s3_bucket,
                    key = %event.s3_file_key,
                    tier = %resources.tier,
                    cpu = resources.cpu_units,
                    memory_mb = resources.memory_mb,
                    disk_mb = resources.ephemeral_disk_mb,
                    cluster = %self.config.cluster,
                    task_definition = %self.config.task_definition,
                    %status,
                    response = %text,
                    "Control plane returned no task id"
                );
                Err(Error::dispatch(format!(
                    "no task started for project {} (status {status})",
                    event.project_id
                )))
            }
        }
    }
}
