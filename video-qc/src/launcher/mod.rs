//! Worker task launchers.
//!
//! A launcher starts exactly one QC worker run for a request. The remote
//! launcher talks to the container control plane; the local launcher spawns a
//! worker process on this host for development.

mod local;
mod remote;

pub use local::LocalTaskLauncher;
pub use remote::HttpTaskLauncher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::dispatch::resources::TaskResources;
use crate::qc::events::QcRequestEvent;

/// Starts worker runs.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Start one run for `event` sized by `resources`. Returns the task id.
    async fn launch(&self, event: &QcRequestEvent, resources: &TaskResources) -> Result<String>;
}

/// Control plane and local worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// RunTask endpoint of the control plane.
    pub control_plane_endpoint: String,
    pub control_plane_token: Option<String>,
    pub cluster: String,
    pub task_definition: String,
    pub container_name: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub capacity_provider: String,
    pub assign_public_ip: bool,
    pub request_timeout_secs: u64,
    /// Spawn workers on this host instead of the control plane.
    pub dev_local_execution: bool,
    pub local_program: String,
    /// Arguments placed before the JSON payload.
    pub local_args: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            control_plane_endpoint: "https://ecs.us-east-1.amazonaws.com".to_string(),
            control_plane_token: None,
            cluster: "video-qc".to_string(),
            task_definition: "video-qc-worker".to_string(),
            container_name: "qc-worker".to_string(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            capacity_provider: "FARGATE_SPOT".to_string(),
            assign_public_ip: false,
            request_timeout_secs: 30,
            dev_local_execution: false,
            local_program: "qc-worker".to_string(),
            local_args: Vec::new(),
        }
    }
}
