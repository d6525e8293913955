//! Object storage collaborator.
//!
//! The service never moves media bytes itself. It only asks storage for object
//! sizes (to size worker tasks) and finalizes multipart uploads started by the
//! ingestion client.

mod http;
mod location;
mod memory;

pub use http::HttpObjectStorage;
pub use location::{ObjectLocation, parse_url_to_bucket_and_key};
pub use memory::MemoryObjectStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * BYTES_PER_MB;

/// Working space added on top of the doubled object size.
pub const DISK_HEADROOM_MB: u64 = 1024;
/// Smallest ephemeral disk a worker task accepts.
pub const MIN_DISK_MB: u64 = 21 * 1024;

/// One uploaded part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    #[serde(alias = "PartNumber")]
    pub part_number: u32,
    #[serde(alias = "ETag", alias = "etag")]
    pub e_tag: String,
}

/// Object storage operations used by the orchestrator.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Size of `bucket/key` in bytes.
    async fn object_size_bytes(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Finalize a multipart upload from its uploaded parts.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Size of `bucket/key` in GB (1024³ bytes).
    async fn object_size_gb(&self, bucket: &str, key: &str) -> Result<f64> {
        let bytes = self.object_size_bytes(bucket, key).await?;
        Ok(bytes as f64 / BYTES_PER_GB as f64)
    }

    /// Ephemeral disk in MB a worker needs for `bucket/key`.
    async fn disk_allocation_mb(&self, bucket: &str, key: &str, max_disk_mb: u64) -> Result<u64> {
        let bytes = self.object_size_bytes(bucket, key).await?;
        Ok(disk_allocation_for_bytes(bytes, max_disk_mb))
    }
}

/// Twice the object size plus headroom, at least [`MIN_DISK_MB`], capped at `max_disk_mb`.
pub fn disk_allocation_for_bytes(bytes: u64, max_disk_mb: u64) -> u64 {
    let size_mb = bytes.div_ceil(BYTES_PER_MB);
    size_mb
        .saturating_mul(2)
        .saturating_add(DISK_HEADROOM_MB)
        .max(MIN_DISK_MB)
        .min(max_disk_mb)
}

/// Storage endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base endpoint. Empty means the regional AWS endpoint.
    pub endpoint: String,
    pub region: String,
    /// Address buckets as `endpoint/bucket/key` instead of `bucket.endpoint/key`.
    pub path_style: bool,
    /// Optional bearer token sent to a signing gateway.
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            path_style: false,
            auth_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com", self.region)
        } else {
            self.endpoint.trim_end_matches('/').to_string()
        }
    }
}
