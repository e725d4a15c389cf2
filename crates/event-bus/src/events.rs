use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::{Bus, BusError, BusResult, LocalBus};

/// Platform events. The wire name doubles as the bus topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "playground new")]
    PlaygroundNew,
    #[serde(rename = "session timer")]
    SessionTimer,
    #[serde(rename = "instance new")]
    InstanceNew,
    #[serde(rename = "instance terminal in")]
    InstanceTerminalIn,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PlaygroundNew => "playground new",
            EventType::SessionTimer => "session timer",
            EventType::InstanceNew => "instance new",
            EventType::InstanceTerminalIn => "instance terminal in",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope published on the bus. `id` is the entity the event is about
/// (playground id for `playground new`, session id for everything else).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub id: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Typed, fire-and-forget facade over a [`Bus`].
#[derive(Clone)]
pub struct EventBus {
    bus: Arc<dyn Bus>,
}

impl EventBus {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    pub fn local() -> Self {
        Self::new(Arc::new(LocalBus::new()))
    }

    /// Publishes an event. Delivery failures are logged and otherwise
    /// ignored; emitters never observe acknowledgement.
    pub fn emit(&self, kind: EventType, id: &str, args: Vec<String>) {
        let event = Event {
            kind,
            id: id.to_string(),
            args,
        };
        match self.publish(&event) {
            Ok(reached) => trace!(event = %kind, id, reached, "event emitted"),
            Err(err) => debug!(event = %kind, id, error = %err, "event dropped"),
        }
    }

    fn publish(&self, event: &Event) -> BusResult<usize> {
        let payload = serde_json::to_vec(event)?;
        self.bus.publish(event.kind.as_str(), Bytes::from(payload))
    }

    pub fn subscribe(&self, kind: EventType) -> EventSubscription {
        EventSubscription {
            receiver: self.bus.subscribe(kind.as_str()),
        }
    }
}

pub struct EventSubscription {
    receiver: broadcast::Receiver<crate::BusMessage>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> BusResult<Event> {
        let message = self.receiver.recv().await.map_err(|err| match err {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(skipped) => BusError::Lagged(skipped),
        })?;
        Ok(serde_json::from_slice(&message.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_typed_envelope_on_event_topic() {
        let bus = Arc::new(LocalBus::new());
        let mut raw = bus.subscribe("session timer");
        let events = EventBus::new(bus.clone());

        events.emit(EventType::SessionTimer, "s1", vec!["01:05".into()]);

        let msg = raw.recv().await.expect("recv");
        let json: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(json["type"], "session timer");
        assert_eq!(json["id"], "s1");
        assert_eq!(json["args"][0], "01:05");
    }

    #[tokio::test]
    async fn subscription_only_sees_its_own_type() {
        let events = EventBus::local();
        let mut timers = events.subscribe(EventType::SessionTimer);

        events.emit(EventType::PlaygroundNew, "pg", Vec::new());
        events.emit(EventType::SessionTimer, "s1", vec!["00:09".into()]);

        let event = timers.recv().await.expect("recv");
        assert_eq!(event.kind, EventType::SessionTimer);
        assert_eq!(event.id, "s1");
    }

    #[test_timeout::timeout]
    fn emit_without_subscribers_is_silent() {
        let events = EventBus::local();
        events.emit(EventType::PlaygroundNew, "pg", Vec::new());
    }
}
