//! Domain model and storage contract for playgrounds, sessions and instances.
//!
//! The [`PlaygroundStore`] trait is what the service consumes. Absence is
//! always reported as [`StoreError::NotFound`] so callers can tell a missing
//! record apart from a failing backend.

mod memory;
mod model;
mod redis_store;

pub use memory::InMemoryStore;
pub use model::{Instance, Playground, Session, DEFAULT_SESSION_DURATION_SECS};
pub use redis_store::RedisStore;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("store error: {0}")]
    Backend(String),
    #[error("corrupt record: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PlaygroundStore: Send + Sync {
    async fn session_get(&self, id: &str) -> StoreResult<Session>;
    async fn session_put(&self, session: Session) -> StoreResult<()>;
    /// Removes the session and every instance it owns.
    async fn session_delete(&self, id: &str) -> StoreResult<()>;
    async fn session_get_all(&self) -> StoreResult<Vec<Session>>;

    async fn instance_get(&self, name: &str) -> StoreResult<Instance>;
    async fn instance_put(&self, instance: Instance) -> StoreResult<()>;
    async fn instance_delete(&self, name: &str) -> StoreResult<()>;
    /// Instances owned by a session, ordered by name. An unknown session
    /// yields an empty list.
    async fn instances_by_session(&self, session_id: &str) -> StoreResult<Vec<Instance>>;

    async fn playground_put(&self, playground: Playground) -> StoreResult<()>;
    async fn playground_get(&self, id: &str) -> StoreResult<Playground>;
    async fn playground_get_all(&self) -> StoreResult<Vec<Playground>>;
}
