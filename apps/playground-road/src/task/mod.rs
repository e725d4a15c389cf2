//! Background behaviours attached to instances.
//!
//! The [`Scheduler`](crate::scheduler::Scheduler) calls [`Task::run`] every
//! time an instance shows up. Implementations decide for themselves what
//! repeated calls mean; the session timer collapses them to one worker per
//! session through its [`WorkerRegistry`].

mod registry;
mod session_timer;

pub use registry::WorkerRegistry;
pub use session_timer::{format_countdown, SessionTimer, TimerExit, TICK_PERIOD};

use async_trait::async_trait;
use playground_store::Instance;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("instance {0} does not belong to a session")]
    DetachedInstance(String),
}

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Invoked once per instance lifecycle event. Must tolerate repeated and
    /// concurrent calls for instances of the same session. Work spawned from
    /// here stops when `ctx` is cancelled.
    async fn run(&self, ctx: CancellationToken, instance: &Instance) -> Result<(), TaskError>;

    /// Cancels and joins whatever `run` left running.
    async fn shutdown(&self) {}
}
