use std::sync::Arc;

use playground_store::{InMemoryStore, PlaygroundStore, RedisStore};
use tracing::{info, warn};

use crate::config::StoreBackend;

pub type StoreHandle = Arc<dyn PlaygroundStore>;

/// Picks the configured backend. Redis problems are not fatal: the service
/// keeps running on the in-memory store and says so.
pub fn build_store(backend: StoreBackend, redis_url: Option<&str>) -> StoreHandle {
    match backend {
        StoreBackend::InMemory => InMemoryStore::new(),
        StoreBackend::Redis => {
            if let Some(url) = redis_url {
                match RedisStore::connect(url) {
                    Ok(store) => {
                        info!("using redis store");
                        return Arc::new(store);
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to init redis store; falling back to memory")
                    }
                }
            } else {
                warn!("STORE_BACKEND=redis but REDIS_URL missing; falling back to in-memory");
            }
            InMemoryStore::new()
        }
    }
}
