//! Topic-based message queue.
//!
//! Publishers address a topic with a partition key. A subscribed consumer
//! group receives each message once per delivery attempt, one message at a
//! time per partition, so messages sharing a key are handled in order.
//! A consumer that does not ack gets the message again after a delay until
//! the delivery budget runs out, after which the message is dead-lettered.

mod memory;

pub use memory::InMemoryQueue;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One delivery of a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub topic: String,
    /// Partition key.
    pub key: String,
    pub payload: String,
    /// 1-based delivery attempt.
    pub delivery: u32,
}

/// Handler for messages of a subscribed topic.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Process one message. Returning `false` asks for redelivery.
    async fn consume(&self, message: &QueueMessage) -> bool;

    /// Called once when `message` has used up its deliveries.
    async fn on_dead_letter(&self, _message: &QueueMessage) {}
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publish `payload` on `topic`, partitioned by `key`. Returns the message id.
    async fn publish(&self, topic: &str, key: &str, payload: String) -> Result<String>;

    /// Attach `consumer` as the consumer group `group` of `topic`.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: Arc<dyn Consumer>,
    ) -> Result<()>;
}

/// Queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Independent partitions, each served by its own consumer task.
    pub partitions: usize,
    /// Deliveries per message before it is dead-lettered.
    pub max_deliveries: u32,
    pub redelivery_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            max_deliveries: 5,
            redelivery_delay_ms: 2_000,
        }
    }
}
