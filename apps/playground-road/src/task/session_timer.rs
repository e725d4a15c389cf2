use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use event_bus::{EventBus, EventType};
use playground_store::{Instance, PlaygroundStore, Session, StoreError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{Task, TaskError, WorkerRegistry};
use crate::clock::{Clock, SystemClock};
use crate::metrics;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a countdown worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerExit {
    Expired,
    Cancelled,
    SessionDeleted,
}

impl TimerExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerExit::Expired => "expired",
            TimerExit::Cancelled => "cancelled",
            TimerExit::SessionDeleted => "session_deleted",
        }
    }
}

enum Tick {
    Continue,
    Stop(TimerExit),
}

/// Publishes the remaining lifetime of every session that has an instance,
/// once per [`TICK_PERIOD`], until the session expires, disappears or the
/// worker is cancelled.
#[derive(Clone)]
pub struct SessionTimer {
    events: EventBus,
    store: Arc<dyn PlaygroundStore>,
    clock: Arc<dyn Clock>,
    registry: WorkerRegistry,
    store_timeout: Option<Duration>,
}

impl SessionTimer {
    pub fn new(events: EventBus, store: Arc<dyn PlaygroundStore>, registry: WorkerRegistry) -> Self {
        Self {
            events,
            store,
            clock: Arc::new(SystemClock),
            registry,
            store_timeout: Some(DEFAULT_STORE_TIMEOUT),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound for one session read. `None` waits as long as the store
    /// takes.
    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    async fn countdown(self, session_id: String, cancel: CancellationToken) -> TimerExit {
        let mut active = ActiveWorker::start(&session_id);

        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break TimerExit::Cancelled,
                _ = ticker.tick() => {
                    // A read that never answers must not outlive cancellation.
                    let step = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Tick::Stop(TimerExit::Cancelled),
                        step = self.tick(&session_id) => step,
                    };
                    if let Tick::Stop(exit) = step {
                        break exit;
                    }
                }
            }
        };

        active.exit = Some(exit);
        exit
    }

    async fn tick(&self, session_id: &str) -> Tick {
        let session = match self.read_session(session_id).await {
            Ok(session) => session,
            Err(err) if err.is_not_found() => {
                debug!(%session_id, "session gone, stopping timer");
                return Tick::Stop(TimerExit::SessionDeleted);
            }
            Err(err) => {
                metrics::TIMER_STORE_ERRORS.inc();
                warn!(%session_id, error = %err, "failed to read session for timer");
                return Tick::Continue;
            }
        };

        let now = self.clock.now();
        if session.is_expired_at(now) {
            debug!(%session_id, "session expired, stopping timer");
            return Tick::Stop(TimerExit::Expired);
        }

        let countdown = format_countdown(session.expires_at - now);
        trace!(%session_id, %countdown, "emitting session timer");
        self.events
            .emit(EventType::SessionTimer, session_id, vec![countdown]);
        metrics::TIMER_EVENTS.inc();
        Tick::Continue
    }

    async fn read_session(&self, session_id: &str) -> Result<Session, StoreError> {
        let read = self.store.session_get(session_id);
        match self.store_timeout {
            Some(limit) => tokio::time::timeout(limit, read).await.unwrap_or_else(|_| {
                Err(StoreError::Backend(format!(
                    "session read exceeded {}ms",
                    limit.as_millis()
                )))
            }),
            None => read.await,
        }
    }
}

/// Keeps the worker gauges honest on every way out of `countdown`,
/// including a panic or the runtime dropping the future.
struct ActiveWorker {
    session_id: String,
    exit: Option<TimerExit>,
}

impl ActiveWorker {
    fn start(session_id: &str) -> Self {
        metrics::TIMER_WORKERS_STARTED.inc();
        metrics::TIMER_WORKERS_ACTIVE.inc();
        debug!(%session_id, "session timer started");
        Self {
            session_id: session_id.to_string(),
            exit: None,
        }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        metrics::TIMER_WORKERS_ACTIVE.dec();
        // No exit recorded means the future was dropped mid-flight: a panic
        // in a tick or runtime teardown.
        let reason = self.exit.map_or("aborted", |exit| exit.as_str());
        metrics::TIMER_EXITS.with_label_values(&[reason]).inc();
        debug!(session_id = %self.session_id, reason, "session timer stopped");
    }
}

#[async_trait]
impl Task for SessionTimer {
    fn name(&self) -> &str {
        "SessionTimer"
    }

    async fn run(&self, ctx: CancellationToken, instance: &Instance) -> Result<(), TaskError> {
        if instance.session_id.is_empty() {
            return Err(TaskError::DetachedInstance(instance.name.clone()));
        }

        let worker = self.clone();
        let session_id = instance.session_id.clone();
        let launched = self.registry.try_launch(&instance.session_id, &ctx, move |token| async move {
            worker.countdown(session_id, token).await;
        });
        if launched {
            debug!(instance = %instance.name, session_id = %instance.session_id, "launched session timer");
        } else {
            trace!(session_id = %instance.session_id, "session timer already running");
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

/// Renders a positive remaining duration as `HH:MM:SS`, or `MM:SS` below one
/// hour. Partial seconds are dropped, never rounded.
pub fn format_countdown(remaining: chrono::Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours >= 1 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test_timeout::timeout]
    fn formats_with_hours_segment() {
        let remaining = Duration::hours(1) + Duration::minutes(30) + Duration::seconds(5);
        assert_eq!(format_countdown(remaining), "01:30:05");
    }

    #[test_timeout::timeout]
    fn drops_hours_segment_below_one_hour() {
        assert_eq!(format_countdown(Duration::seconds(65)), "01:05");
        assert_eq!(format_countdown(Duration::seconds(3599)), "59:59");
        assert_eq!(format_countdown(Duration::seconds(3600)), "01:00:00");
    }

    #[test_timeout::timeout]
    fn truncates_partial_seconds() {
        assert_eq!(format_countdown(Duration::milliseconds(65_999)), "01:05");
        assert_eq!(format_countdown(Duration::milliseconds(400)), "00:00");
    }

    #[test_timeout::timeout]
    fn hours_are_not_capped_at_two_digits() {
        assert_eq!(format_countdown(Duration::hours(123) + Duration::seconds(7)), "123:00:07");
    }

    #[test_timeout::timeout]
    fn exit_reasons_have_stable_labels() {
        assert_eq!(TimerExit::Expired.as_str(), "expired");
        assert_eq!(TimerExit::Cancelled.as_str(), "cancelled");
        assert_eq!(TimerExit::SessionDeleted.as_str(), "session_deleted");
    }
}
