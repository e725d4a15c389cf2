#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playground_road::clock::Clock;
use playground_store::{
    InMemoryStore, Instance, Playground, PlaygroundStore, Session, StoreError, StoreResult,
};

/// Wall clock that moves with tokio's (possibly paused) clock.
pub struct TestClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TestClock {
    pub fn new(base: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            base,
            origin: tokio::time::Instant::now(),
        })
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.origin.elapsed()).unwrap()
    }
}

/// In-memory store whose session reads can be made to fail, hang or panic.
pub struct FlakyStore {
    inner: Arc<InMemoryStore>,
    fail_session_reads: AtomicUsize,
    hang_session_reads: AtomicUsize,
    panic_session_reads: AtomicUsize,
    fail_everything: AtomicBool,
    session_reads: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            fail_session_reads: AtomicUsize::new(0),
            hang_session_reads: AtomicUsize::new(0),
            panic_session_reads: AtomicUsize::new(0),
            fail_everything: AtomicBool::new(false),
            session_reads: AtomicUsize::new(0),
        })
    }

    pub fn fail_next_session_reads(&self, n: usize) {
        self.fail_session_reads.store(n, Ordering::SeqCst);
    }

    pub fn hang_next_session_reads(&self, n: usize) {
        self.hang_session_reads.store(n, Ordering::SeqCst);
    }

    pub fn panic_next_session_reads(&self, n: usize) {
        self.panic_session_reads.store(n, Ordering::SeqCst);
    }

    /// Every call fails with a backend error from now on.
    pub fn break_backend(&self) {
        self.fail_everything.store(true, Ordering::SeqCst);
    }

    pub fn session_reads(&self) -> usize {
        self.session_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("backend unavailable".into()));
        }
        Ok(())
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PlaygroundStore for FlakyStore {
    async fn session_get(&self, id: &str) -> StoreResult<Session> {
        self.session_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if Self::take(&self.panic_session_reads) {
            panic!("session read blew up");
        }
        if Self::take(&self.hang_session_reads) {
            std::future::pending::<()>().await;
        }
        if Self::take(&self.fail_session_reads) {
            return Err(StoreError::Backend("injected failure".into()));
        }
        self.inner.session_get(id).await
    }

    async fn session_put(&self, session: Session) -> StoreResult<()> {
        self.check()?;
        self.inner.session_put(session).await
    }

    async fn session_delete(&self, id: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.session_delete(id).await
    }

    async fn session_get_all(&self) -> StoreResult<Vec<Session>> {
        self.check()?;
        self.inner.session_get_all().await
    }

    async fn instance_get(&self, name: &str) -> StoreResult<Instance> {
        self.check()?;
        self.inner.instance_get(name).await
    }

    async fn instance_put(&self, instance: Instance) -> StoreResult<()> {
        self.check()?;
        self.inner.instance_put(instance).await
    }

    async fn instance_delete(&self, name: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.instance_delete(name).await
    }

    async fn instances_by_session(&self, session_id: &str) -> StoreResult<Vec<Instance>> {
        self.check()?;
        self.inner.instances_by_session(session_id).await
    }

    async fn playground_put(&self, playground: Playground) -> StoreResult<()> {
        self.check()?;
        self.inner.playground_put(playground).await
    }

    async fn playground_get(&self, id: &str) -> StoreResult<Playground> {
        self.check()?;
        self.inner.playground_get(id).await
    }

    async fn playground_get_all(&self) -> StoreResult<Vec<Playground>> {
        self.check()?;
        self.inner.playground_get_all().await
    }
}

pub fn session(id: &str, now: DateTime<Utc>, lifetime: chrono::Duration) -> Session {
    Session {
        id: id.into(),
        playground_id: "pg".into(),
        created_at: now,
        expires_at: now + lifetime,
    }
}

pub fn instance(name: &str, session_id: &str) -> Instance {
    Instance {
        name: name.into(),
        session_id: session_id.into(),
        hostname: name.into(),
        ip: "10.0.0.2".into(),
        image: "franela/dind".into(),
        created_at: Utc::now(),
    }
}
