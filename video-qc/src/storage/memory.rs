//! In-memory object storage for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CompletedPart, ObjectStorage};
use crate::{Error, Result};

/// Object sizes and completed uploads kept in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    sizes: RwLock<HashMap<(String, String), u64>>,
    completed: RwLock<Vec<(String, String, String, usize)>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object of `size` bytes.
    pub fn put_object(&self, bucket: &str, key: &str, size: u64) {
        self.sizes
            .write()
            .insert((bucket.to_string(), key.to_string()), size);
    }

    /// `(bucket, key, upload_id, part_count)` of every completed upload.
    pub fn completed_uploads(&self) -> Vec<(String, String, String, usize)> {
        self.completed.read().clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn object_size_bytes(&self, bucket: &str, key: &str) -> Result<u64> {
        self.sizes
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .copied()
            .ok_or_else(|| Error::not_found("Object", format!("{bucket}/{key}")))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        if parts.is_empty() {
            return Err(Error::validation("multipart upload needs at least one part"));
        }
        self.completed.write().push((
            bucket.to_string(),
            key.to_string(),
            upload_id.to_string(),
            parts.len(),
        ));
        Ok(())
    }
}
