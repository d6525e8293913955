//! Resource sizing for QC worker tasks.
//!
//! Maps the size of the object under analysis onto a fixed compute tier and
//! an ephemeral disk allocation.

use serde::{Deserialize, Serialize};

/// Fixed compute profile for a worker task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceTier {
    Small,
    Medium,
    Large,
}

/// CPU and memory of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    /// CPU units, 1024 per vCPU.
    pub cpu_units: u32,
    pub memory_mb: u32,
}

/// Fully resolved resources for one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResources {
    pub tier: ResourceTier,
    pub cpu_units: u32,
    pub memory_mb: u32,
    pub ephemeral_disk_mb: u64,
}

/// Sizing thresholds and tier definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Objects at or above this size (GB) get at least the medium tier.
    pub medium_threshold_gb: f64,
    /// Objects at or above this size (GB) get the large tier.
    pub large_threshold_gb: f64,
    pub small: TierSpec,
    pub medium: TierSpec,
    pub large: TierSpec,
    /// Ceiling for the ephemeral disk allocation.
    pub max_disk_mb: u64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            medium_threshold_gb: 2.0,
            large_threshold_gb: 10.0,
            small: TierSpec {
                cpu_units: 1024,
                memory_mb: 4096,
            },
            medium: TierSpec {
                cpu_units: 2048,
                memory_mb: 8192,
            },
            large: TierSpec {
                cpu_units: 4096,
                memory_mb: 16384,
            },
            max_disk_mb: 200 * 1024,
        }
    }
}

impl SizingConfig {
    /// Pick the tier for an object of `file_size_gb`.
    pub fn pick_resource_tier(&self, file_size_gb: f64) -> ResourceTier {
        if file_size_gb < self.medium_threshold_gb {
            ResourceTier::Small
        } else if file_size_gb < self.large_threshold_gb {
            ResourceTier::Medium
        } else {
            ResourceTier::Large
        }
    }

    pub fn spec(&self, tier: ResourceTier) -> TierSpec {
        match tier {
            ResourceTier::Small => self.small,
            ResourceTier::Medium => self.medium,
            ResourceTier::Large => self.large,
        }
    }

    /// Combine the tier picked for `file_size_gb` with a disk allocation.
    pub fn resolve(&self, file_size_gb: f64, ephemeral_disk_mb: u64) -> TaskResources {
        let tier = self.pick_resource_tier(file_size_gb);
        let spec = self.spec(tier);
        TaskResources {
            tier,
            cpu_units: spec.cpu_units,
            memory_mb: spec.memory_mb,
            ephemeral_disk_mb,
        }
    }
}
