use std::sync::Arc;

use event_bus::{EventBus, EventType};
use playground_store::{Instance, Playground, PlaygroundStore, Session, StoreError};
use tracing::{debug, error, info};

use crate::addressing::{host_without_port, playground_id};
use crate::error::PlatformError;
use crate::metrics;

/// Playground, session and instance lookups shared by the HTTP surface and
/// the background tasks.
#[derive(Clone)]
pub struct Platform {
    store: Arc<dyn PlaygroundStore>,
    events: EventBus,
}

impl Platform {
    pub fn new(store: Arc<dyn PlaygroundStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> Arc<dyn PlaygroundStore> {
        Arc::clone(&self.store)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Assigns the domain-derived id, persists the playground and announces
    /// it. Re-creating a domain overwrites the existing record.
    pub async fn playground_new(
        &self,
        mut playground: Playground,
    ) -> Result<Playground, PlatformError> {
        playground.id = playground_id(&playground.domain);
        if let Err(err) = self.store.playground_put(playground.clone()).await {
            error!(playground_id = %playground.id, error = %err, "failed to save playground");
            return Err(err.into());
        }

        metrics::PLAYGROUNDS_CREATED.inc();
        info!(playground_id = %playground.id, domain = %playground.domain, "playground created");
        self.events
            .emit(EventType::PlaygroundNew, &playground.id, Vec::new());
        Ok(playground)
    }

    pub async fn playground_get(&self, id: &str) -> Result<Playground, PlatformError> {
        self.store.playground_get(id).await.map_err(|err| match err {
            StoreError::NotFound { .. } => PlatformError::PlaygroundNotFound(id.to_string()),
            other => {
                error!(playground_id = %id, error = %other, "failed to retrieve playground");
                PlatformError::Store(other)
            }
        })
    }

    /// Looks the domain up as given, then without its `:port` suffix. Only a
    /// genuine miss triggers the second lookup; store failures surface as is.
    pub async fn playground_find_by_domain(
        &self,
        domain: &str,
    ) -> Result<Playground, PlatformError> {
        match self.playground_get(&playground_id(domain)).await {
            Err(PlatformError::PlaygroundNotFound(_)) => {}
            found_or_failed => return found_or_failed,
        }

        let Some(host) = host_without_port(domain) else {
            return Err(PlatformError::PlaygroundNotFound(domain.to_string()));
        };
        debug!(domain, host, "retrying playground lookup without port");
        self.playground_get(&playground_id(host))
            .await
            .map_err(|err| match err {
                PlatformError::PlaygroundNotFound(_) => {
                    PlatformError::PlaygroundNotFound(domain.to_string())
                }
                other => other,
            })
    }

    /// Returns the playground serving `domain`, creating it with the given
    /// session duration when nothing matches yet.
    pub async fn ensure_playground(
        &self,
        domain: &str,
        default_session_duration_secs: u64,
    ) -> Result<Playground, PlatformError> {
        match self.playground_find_by_domain(domain).await {
            Err(PlatformError::PlaygroundNotFound(_)) => {
                let mut playground = Playground::for_domain(domain);
                playground.default_session_duration_secs = default_session_duration_secs;
                self.playground_new(playground).await
            }
            found_or_failed => found_or_failed,
        }
    }

    pub async fn playground_list(&self) -> Result<Vec<Playground>, PlatformError> {
        Ok(self.store.playground_get_all().await?)
    }

    pub async fn session_get(&self, id: &str) -> Result<Session, PlatformError> {
        self.store.session_get(id).await.map_err(|err| match err {
            StoreError::NotFound { .. } => PlatformError::SessionNotFound(id.to_string()),
            other => PlatformError::Store(other),
        })
    }

    /// Resolves the one instance of a session. Zero or several instances
    /// are reported as errors rather than picking one.
    pub async fn instance_get_single(&self, session: &Session) -> Result<Instance, PlatformError> {
        let mut instances = self.store.instances_by_session(&session.id).await?;
        match instances.len() {
            0 => Err(PlatformError::NoInstance(session.id.clone())),
            1 => Ok(instances.remove(0)),
            count => Err(PlatformError::AmbiguousInstance {
                session_id: session.id.clone(),
                count,
            }),
        }
    }
}
