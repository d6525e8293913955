//! Local worker launcher for development.

use async_trait::async_trait;
use process_utils::detached_tokio_command;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

use super::{LauncherConfig, TaskLauncher};
use crate::dispatch::resources::TaskResources;
use crate::qc::events::QcRequestEvent;
use crate::{Error, Result};

/// Spawns the worker as a detached child process on this host.
pub struct LocalTaskLauncher {
    program: String,
    args: Vec<String>,
}

impl LocalTaskLauncher {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            program: config.local_program.clone(),
            args: config.local_args.clone(),
        }
    }
}

/// Forward each line of `reader` to the log until the stream closes.
fn forward_lines<R>(reader: R, project_id: String, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if stream == "stderr" {
                        warn!(target: "video_qc::worker", project_id = %project_id, "{}", line);
                    } else {
                        info!(target: "video_qc::worker", project_id = %project_id, "{}", line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(project_id = %project_id, stream, "Failed to read worker output: {}", e);
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl TaskLauncher for LocalTaskLauncher {
    async fn launch(&self, event: &QcRequestEvent, resources: &TaskResources) -> Result<String> {
        let payload = serde_json::to_string(event)?;

        let mut child = detached_tokio_command(&self.program)
            .args(&self.args)
            .arg(payload)
            .spawn()
            .map_err(|e| {
                Error::dispatch(format!(
                    "failed to spawn local worker '{}' for project {}: {e}",
                    self.program, event.project_id
                ))
            })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::dispatch("local worker exited before reporting a pid"))?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, event.project_id.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, event.project_id.clone(), "stderr");
        }

        // Reap the child in the background so it does not linger as a zombie.
        let project_id = event.project_id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(project_id = %project_id, pid, %status, "Local worker exited"),
                Err(e) => warn!(project_id = %project_id, pid, "Failed to wait for local worker: {}", e),
            }
        });

        info!(
            project_id = %event.project_id,
            attempt = event.attempt,
            tier = %resources.tier,
            pid,
            "Spawned local QC worker"
        );
        Ok(format!("local-{pid}"))
    }
}
