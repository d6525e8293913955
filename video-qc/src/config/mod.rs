//! Application configuration.
//!
//! Everything is read from the environment (after `.env` is loaded) into typed
//! sections. Unset or unparsable variables keep their defaults.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::dispatch::resources::{SizingConfig, TierSpec};
use crate::launcher::LauncherConfig;
use crate::qc::QcConfig;
use crate::queue::QueueConfig;
use crate::storage::StorageConfig;
use crate::{Error, Result};

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// `None` sizes the pool from the CPU count.
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:video-qc.db?mode=rwc".to_string(),
            max_connections: None,
        }
    }
}

/// Authentication settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Shared secret for service-to-service calls.
    pub internal_secret: String,
    pub worker_token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "video-qc".to_string(),
            jwt_audience: "video-qc-api".to_string(),
            internal_secret: String::new(),
            worker_token_ttl_secs: 6 * 60 * 60,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("worker_token_ttl_secs", &self.worker_token_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ApiServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub qc: QcConfig,
    pub sizing: SizingConfig,
    pub launcher: LauncherConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub log_dir: String,
}

/// Reads variables through `lookup`, skipping blank values.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring unparsable value for {}: '{}'", key, raw);
                None
            }
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        let raw = self.string(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                warn!("Ignoring unparsable flag for {}: '{}'", key, raw);
                None
            }
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.string(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    fn set<T>(&self, target: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *target = value;
        }
    }

    fn tier(&self, prefix: &str, target: &mut TierSpec) {
        self.set(&mut target.cpu_units, self.parse(&format!("{prefix}_CPU")));
        self.set(
            &mut target.memory_mb,
            self.parse(&format!("{prefix}_MEMORY_MB")),
        );
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut config = Self {
            log_dir: "logs".to_string(),
            ..Self::default()
        };

        let server = &mut config.server;
        env.set(&mut server.bind_address, env.string("API_BIND_ADDRESS"));
        env.set(&mut server.port, env.parse("API_PORT"));
        env.set(&mut server.enable_cors, env.flag("API_ENABLE_CORS"));
        env.set(&mut server.body_limit, env.parse("API_BODY_LIMIT"));

        env.set(&mut config.database.url, env.string("DATABASE_URL"));
        config.database.max_connections = env.parse("DATABASE_MAX_CONNECTIONS");

        let auth = &mut config.auth;
        env.set(&mut auth.jwt_secret, env.string("JWT_SECRET"));
        env.set(&mut auth.jwt_issuer, env.string("JWT_ISSUER"));
        env.set(&mut auth.jwt_audience, env.string("JWT_AUDIENCE"));
        env.set(&mut auth.internal_secret, env.string("INTERNAL_SECRET"));
        env.set(
            &mut auth.worker_token_ttl_secs,
            env.parse("WORKER_TOKEN_TTL_SECS"),
        );

        let qc = &mut config.qc;
        env.set(&mut qc.progress_base_url, env.string("QC_PROGRESS_BASE_URL"));
        env.set(&mut qc.s3_region, env.string("AWS_REGION"));
        env.set(&mut qc.request_topic, env.string("QC_REQUEST_TOPIC"));
        env.set(&mut qc.consumer_group, env.string("QC_CONSUMER_GROUP"));

        let sizing = &mut config.sizing;
        env.set(
            &mut sizing.medium_threshold_gb,
            env.parse("QC_MEDIUM_THRESHOLD_GB"),
        );
        env.set(
            &mut sizing.large_threshold_gb,
            env.parse("QC_LARGE_THRESHOLD_GB"),
        );
        env.tier("QC_SMALL", &mut sizing.small);
        env.tier("QC_MEDIUM", &mut sizing.medium);
        env.tier("QC_LARGE", &mut sizing.large);
        env.set(&mut sizing.max_disk_mb, env.parse("QC_MAX_DISK_MB"));

        let launcher = &mut config.launcher;
        env.set(
            &mut launcher.control_plane_endpoint,
            env.string("ECS_ENDPOINT"),
        );
        launcher.control_plane_token = env.string("ECS_TOKEN");
        env.set(&mut launcher.cluster, env.string("ECS_CLUSTER"));
        env.set(
            &mut launcher.task_definition,
            env.string("ECS_TASK_DEFINITION"),
        );
        env.set(&mut launcher.container_name, env.string("ECS_CONTAINER_NAME"));
        env.set(&mut launcher.subnets, env.list("ECS_SUBNETS"));
        env.set(&mut launcher.security_groups, env.list("ECS_SECURITY_GROUPS"));
        env.set(
            &mut launcher.capacity_provider,
            env.string("ECS_CAPACITY_PROVIDER"),
        );
        env.set(
            &mut launcher.assign_public_ip,
            env.flag("ECS_ASSIGN_PUBLIC_IP"),
        );
        env.set(
            &mut launcher.dev_local_execution,
            env.flag("DEV_LOCAL_EXECUTION"),
        );
        env.set(
            &mut launcher.local_program,
            env.string("QC_LOCAL_WORKER_PROGRAM"),
        );
        env.set(&mut launcher.local_args, env.list("QC_LOCAL_WORKER_ARGS"));

        let storage = &mut config.storage;
        env.set(&mut storage.endpoint, env.string("S3_ENDPOINT"));
        env.set(&mut storage.region, env.string("AWS_REGION"));
        env.set(&mut storage.path_style, env.flag("S3_FORCE_PATH_STYLE"));
        storage.auth_token = env.string("S3_AUTH_TOKEN");
        env.set(
            &mut storage.request_timeout_secs,
            env.parse("S3_REQUEST_TIMEOUT_SECS"),
        );

        let queue = &mut config.queue;
        env.set(&mut queue.partitions, env.parse("QUEUE_PARTITIONS"));
        env.set(&mut queue.max_deliveries, env.parse("QUEUE_MAX_DELIVERIES"));
        env.set(
            &mut queue.redelivery_delay_ms,
            env.parse("QUEUE_REDELIVERY_DELAY_MS"),
        );

        env.set(&mut config.log_dir, env.string("LOG_DIR"));

        config
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::config("JWT_SECRET must be set"));
        }
        if self.auth.internal_secret.is_empty() {
            return Err(Error::config("INTERNAL_SECRET must be set"));
        }
        if self.sizing.medium_threshold_gb > self.sizing.large_threshold_gb {
            return Err(Error::config(format!(
                "QC_MEDIUM_THRESHOLD_GB ({}) exceeds QC_LARGE_THRESHOLD_GB ({})",
                self.sizing.medium_threshold_gb, self.sizing.large_threshold_gb
            )));
        }
        if !self.launcher.dev_local_execution
            && (self.launcher.subnets.is_empty() || self.launcher.security_groups.is_empty())
        {
            warn!("ECS_SUBNETS or ECS_SECURITY_GROUPS is empty; remote task launches will likely fail");
        }
        Ok(())
    }
}
