//! Session terminal resolution and the interactive channel handed to the
//! terminal transport.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use event_bus::{BusError, EventBus, EventType};
use futures_util::{SinkExt, StreamExt};
use playground_store::Instance;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::platform::Platform;

/// Addressing context for a terminal connection once the session has been
/// resolved to its instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalTarget {
    pub session_id: String,
    pub instance_name: String,
}

impl TerminalTarget {
    pub fn for_instance(instance: &Instance) -> Self {
        Self {
            session_id: instance.session_id.clone(),
            instance_name: instance.name.clone(),
        }
    }
}

/// Resolves `session_id` to the session's single instance.
pub async fn resolve(platform: &Platform, session_id: &str) -> Result<Instance, PlatformError> {
    let session = platform.session_get(session_id).await?;
    platform.instance_get_single(&session).await
}

#[async_trait]
pub trait TerminalTransport: Send + Sync {
    async fn serve(&self, socket: WebSocket, target: TerminalTarget);
}

/// Streams the session's events to the browser and forwards what the
/// browser types as `instance terminal in` events for the instance.
#[derive(Clone)]
pub struct EventStreamTransport {
    events: EventBus,
}

impl EventStreamTransport {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl TerminalTransport for EventStreamTransport {
    async fn serve(&self, socket: WebSocket, target: TerminalTarget) {
        let (mut outgoing, mut incoming) = socket.split();
        let mut timers = self.events.subscribe(EventType::SessionTimer);
        debug!(session_id = %target.session_id, instance = %target.instance_name, "terminal attached");

        loop {
            tokio::select! {
                event = timers.recv() => match event {
                    Ok(event) if event.id == target.session_id => {
                        let frame = match serde_json::to_string(&event) {
                            Ok(frame) => frame,
                            Err(err) => {
                                warn!(error = %err, "failed to encode terminal event");
                                continue;
                            }
                        };
                        if outgoing.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(BusError::Lagged(skipped)) => {
                        debug!(session_id = %target.session_id, skipped, "terminal lagged behind events");
                    }
                    Err(_) => break,
                },
                frame = incoming.next() => match frame {
                    Some(Ok(Message::Text(data))) => self.forward_input(&target, data),
                    Some(Ok(Message::Binary(data))) => {
                        self.forward_input(&target, String::from_utf8_lossy(&data).into_owned())
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(session_id = %target.session_id, error = %err, "terminal socket error");
                        break;
                    }
                },
            }
        }

        debug!(session_id = %target.session_id, instance = %target.instance_name, "terminal detached");
    }
}

impl EventStreamTransport {
    fn forward_input(&self, target: &TerminalTarget, data: String) {
        self.events.emit(
            EventType::InstanceTerminalIn,
            &target.session_id,
            vec![target.instance_name.clone(), data],
        );
    }
}
