//! In-process channel with per-topic retention and live fan-out.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use briefrun_core::TaskMessage;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use super::{MessageHandle, PublishError, TaskChannel};

const DEFAULT_CAPACITY: usize = 256;
const DEFAULT_RETENTION: usize = 1024;

/// Stream of messages delivered to a subscriber.
pub type MessageStream = Pin<Box<dyn Stream<Item = TaskMessage> + Send>>;

struct Topic {
    retained: VecDeque<TaskMessage>,
    tx: broadcast::Sender<TaskMessage>,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            retained: VecDeque::new(),
            tx,
        }
    }
}

/// Channel that keeps the most recent messages of each topic and forwards
/// every message to live subscribers.
///
/// Publishing succeeds whether or not anyone is subscribed. Each topic
/// retains at most `retention` messages, oldest dropped first.
pub struct InMemoryChannel {
    topics: RwLock<HashMap<String, Topic>>,
    next_seq: AtomicU64,
    capacity: usize,
    retention: usize,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel whose live subscribers may lag by up to `capacity`
    /// messages before missing some.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            capacity: capacity.max(1),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Keep at most `retention` messages per topic.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Subscribe to messages published to `topic` from now on.
    pub async fn subscribe(&self, topic: &str) -> MessageStream {
        let rx = {
            let mut topics = self.topics.write().await;
            topics
                .entry(topic.to_string())
                .or_insert_with(|| Topic::new(self.capacity))
                .tx
                .subscribe()
        };

        Box::pin(BroadcastStream::new(rx).filter_map(|item| item.ok()))
    }

    /// Messages retained for `topic`, oldest first.
    pub async fn published(&self, topic: &str) -> Vec<TaskMessage> {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|t| t.retained.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskChannel for InMemoryChannel {
    async fn publish(&self, topic: &str, message: &TaskMessage) -> Result<MessageHandle, PublishError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.topics.write().await;
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(self.capacity));

        if self.retention > 0 {
            if entry.retained.len() == self.retention {
                entry.retained.pop_front();
            }
            entry.retained.push_back(message.clone());
        }
        // No live subscribers is fine.
        let _ = entry.tx.send(message.clone());

        Ok(MessageHandle::new(format!("{topic}-{seq}")))
    }
}
