use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

#[derive(Default)]
struct Inner {
    workers: Mutex<HashMap<String, CancellationToken>>,
    tracker: TaskTracker,
    launched: AtomicUsize,
}

/// Table of running per-session workers, keyed by session id.
///
/// The lock only ever guards a map operation. Workers are spawned after it
/// is released and remove their own entry when they finish, however they
/// finish.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    inner: Arc<Inner>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the worker built by `make` unless one is already registered
    /// for `session_id`. The worker receives a child of `parent`. Returns
    /// whether a worker was launched.
    pub fn try_launch<F, Fut>(&self, session_id: &str, parent: &CancellationToken, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // The tracker token is taken under the same lock `shutdown` closes
        // the tracker under, so an admitted worker is always waited for.
        let (token, tracked) = {
            let mut workers = self.inner.workers.lock();
            if workers.contains_key(session_id) || self.inner.tracker.is_closed() {
                return false;
            }
            let token = parent.child_token();
            workers.insert(session_id.to_string(), token.clone());
            (token, self.inner.tracker.token())
        };

        let registration = Registration {
            registry: self.clone(),
            session_id: session_id.to_string(),
        };
        let worker = make(token);
        self.inner.launched.fetch_add(1, Ordering::Relaxed);
        self.inner.tracker.spawn(async move {
            let _registration = registration;
            worker.await;
        });
        drop(tracked);
        true
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.workers.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total workers launched over the registry's lifetime.
    pub fn launched(&self) -> usize {
        self.inner.launched.load(Ordering::Relaxed)
    }

    /// Signals the session's worker to stop. The entry disappears once the
    /// worker has actually exited.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.inner.workers.lock().get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Refuses new launches, cancels every worker and waits for all of them
    /// to exit.
    pub async fn shutdown(&self) {
        let cancelled = {
            let workers = self.inner.workers.lock();
            self.inner.tracker.close();
            for token in workers.values() {
                token.cancel();
            }
            workers.len()
        };
        debug!(cancelled, "waiting for session workers");
        self.inner.tracker.wait().await;
    }

    fn deregister(&self, session_id: &str) {
        self.inner.workers.lock().remove(session_id);
    }
}

/// Removes the registry entry when the worker future is dropped, which
/// covers normal exit, cancellation, panics and runtime teardown.
struct Registration {
    registry: WorkerRegistry,
    session_id: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(&self.session_id);
    }
}
