use std::sync::Arc;
use std::time::Instant;

use crate::platform::Platform;
use crate::terminal::{EventStreamTransport, TerminalTransport};

#[derive(Clone)]
pub struct AppState {
    start: Instant,
    platform: Platform,
    transport: Arc<dyn TerminalTransport>,
}

impl AppState {
    pub fn new(platform: Platform, transport: Arc<dyn TerminalTransport>) -> Self {
        Self {
            start: Instant::now(),
            platform,
            transport,
        }
    }

    /// State wired with the event-stream terminal transport over the
    /// platform's own bus.
    pub fn with_event_stream(platform: Platform) -> Self {
        let transport = Arc::new(EventStreamTransport::new(platform.events().clone()));
        Self::new(platform, transport)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn transport(&self) -> Arc<dyn TerminalTransport> {
        Arc::clone(&self.transport)
    }
}
