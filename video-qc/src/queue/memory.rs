//! In-process partitioned queue.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Consumer, MessageQueue, QueueConfig, QueueMessage};
use crate::{Error, Result};

enum TopicState {
    /// No consumer yet. Messages wait here until one subscribes.
    Buffered(Vec<QueueMessage>),
    Subscribed {
        group: String,
        partitions: Vec<mpsc::UnboundedSender<QueueMessage>>,
    },
}

/// Queue whose topics live in this process.
///
/// Each subscribed topic runs one consumer task per partition. Tasks stop when
/// the cancellation token fires.
pub struct InMemoryQueue {
    config: QueueConfig,
    topics: Mutex<HashMap<String, TopicState>>,
    dead_letters: Arc<Mutex<Vec<QueueMessage>>>,
    cancellation_token: CancellationToken,
}

impl InMemoryQueue {
    pub fn new(config: QueueConfig, cancellation_token: CancellationToken) -> Self {
        Self {
            config: QueueConfig {
                partitions: config.partitions.max(1),
                max_deliveries: config.max_deliveries.max(1),
                ..config
            },
            topics: Mutex::new(HashMap::new()),
            dead_letters: Arc::new(Mutex::new(Vec::new())),
            cancellation_token,
        }
    }

    /// Messages that ran out of deliveries, oldest first.
    pub fn dead_letters(&self) -> Vec<QueueMessage> {
        self.dead_letters.lock().clone()
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.config.partitions as u64) as usize
    }

    fn spawn_member(
        &self,
        topic: String,
        partition: usize,
        consumer: Arc<dyn Consumer>,
        mut rx: mpsc::UnboundedReceiver<QueueMessage>,
    ) {
        let token = self.cancellation_token.clone();
        let max_deliveries = self.config.max_deliveries;
        let delay = Duration::from_millis(self.config.redelivery_delay_ms);
        let dead_letters = self.dead_letters.clone();

        tokio::spawn(async move {
            debug!(topic = %topic, partition, "Queue member started");
            loop {
                let mut message = tokio::select! {
                    _ = token.cancelled() => break,
                    message = rx.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };

                loop {
                    if consumer.consume(&message).await {
                        break;
                    }

                    if message.delivery >= max_deliveries {
                        error!(
                            topic = %topic,
                            key = %message.key,
                            message_id = %message.id,
                            deliveries = message.delivery,
                            "Message exhausted its deliveries, dead-lettering"
                        );
                        consumer.on_dead_letter(&message).await;
                        dead_letters.lock().push(message);
                        break;
                    }

                    warn!(
                        topic = %topic,
                        key = %message.key,
                        message_id = %message.id,
                        delivery = message.delivery,
                        "Message not acknowledged, scheduling redelivery"
                    );
                    message.delivery += 1;

                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!(topic = %topic, partition, "Queue member stopped");
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
            debug!(topic = %topic, partition, "Queue member stopped");
        });
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(&self, topic: &str, key: &str, payload: String) -> Result<String> {
        let message = QueueMessage {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
            delivery: 1,
        };
        let id = message.id.clone();
        let partition = self.partition_for(key);

        let mut topics = self.topics.lock();
        match topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::Buffered(Vec::new()))
        {
            TopicState::Buffered(pending) => pending.push(message),
            TopicState::Subscribed { partitions, .. } => partitions[partition]
                .send(message)
                .map_err(|_| Error::Queue(format!("topic '{topic}' is shut down")))?,
        }

        debug!(topic, key, message_id = %id, partition, "Published message");
        Ok(id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: Arc<dyn Consumer>,
    ) -> Result<()> {
        let mut receivers = Vec::with_capacity(self.config.partitions);
        let mut senders = Vec::with_capacity(self.config.partitions);
        for _ in 0..self.config.partitions {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }

        let pending = {
            let mut topics = self.topics.lock();
            let state = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicState::Buffered(Vec::new()));
            if let TopicState::Subscribed { group: existing, .. } = state {
                return Err(Error::Queue(format!(
                    "topic '{topic}' already has consumer group '{existing}'"
                )));
            }
            let previous = std::mem::replace(
                state,
                TopicState::Subscribed {
                    group: group.to_string(),
                    partitions: senders.clone(),
                },
            );
            match previous {
                TopicState::Buffered(pending) => pending,
                TopicState::Subscribed { .. } => Vec::new(),
            }
        };

        for (partition, rx) in receivers.into_iter().enumerate() {
            self.spawn_member(topic.to_string(), partition, consumer.clone(), rx);
        }

        let backlog = pending.len();
        for message in pending {
            let partition = self.partition_for(&message.key);
            let _ = senders[partition].send(message);
        }

        info!(
            topic,
            group,
            partitions = self.config.partitions,
            backlog,
            "Consumer group subscribed"
        );
        Ok(())
    }
}
