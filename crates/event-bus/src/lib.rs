//! Topic based event bus used to fan platform events out to terminals and
//! background workers.
//!
//! [`Bus`] is the raw transport contract (topic + bytes). [`EventBus`] layers
//! the typed [`Event`] envelope on top of it and is what the rest of the
//! workspace talks to.

mod events;

pub use events::{Event, EventBus, EventSubscription, EventType};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
    #[error("subscriber lagged behind by {0} messages")]
    Lagged(u64),
    #[error("malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;

pub trait Bus: Send + Sync {
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage>;

    /// Publishes `payload` on `topic`. Returns the number of subscribers the
    /// message reached; zero subscribers is not an error.
    fn publish(&self, topic: &str, payload: Bytes) -> BusResult<usize>;
}

/// In-process bus: one broadcast channel per topic, created lazily.
#[derive(Debug, Default)]
pub struct LocalBus {
    topics: parking_lot::RwLock<std::collections::HashMap<String, broadcast::Sender<BusMessage>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        let mut guard = self.topics.write();
        guard
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl Bus for LocalBus {
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.sender_for(topic).subscribe()
    }

    fn publish(&self, topic: &str, payload: Bytes) -> BusResult<usize> {
        let sender = self.sender_for(topic);
        if sender.receiver_count() == 0 {
            return Ok(0);
        }
        sender
            .send(BusMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| BusError::Closed)
    }
}
