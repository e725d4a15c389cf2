use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Instance, Playground, PlaygroundStore, Session, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, Session>,
    instances: BTreeMap<String, Instance>,
    playgrounds: HashMap<String, Playground>,
}

/// In-memory adapter for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PlaygroundStore for InMemoryStore {
    async fn session_get(&self, id: &str) -> StoreResult<Session> {
        self.tables
            .read()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("session", id))
    }

    async fn session_put(&self, session: Session) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn session_delete(&self, id: &str) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        guard.sessions.remove(id);
        guard.instances.retain(|_, instance| instance.session_id != id);
        Ok(())
    }

    async fn session_get_all(&self) -> StoreResult<Vec<Session>> {
        Ok(self.tables.read().await.sessions.values().cloned().collect())
    }

    async fn instance_get(&self, name: &str) -> StoreResult<Instance> {
        self.tables
            .read()
            .await
            .instances
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("instance", name))
    }

    async fn instance_put(&self, instance: Instance) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .instances
            .insert(instance.name.clone(), instance);
        Ok(())
    }

    async fn instance_delete(&self, name: &str) -> StoreResult<()> {
        self.tables.write().await.instances.remove(name);
        Ok(())
    }

    async fn instances_by_session(&self, session_id: &str) -> StoreResult<Vec<Instance>> {
        Ok(self
            .tables
            .read()
            .await
            .instances
            .values()
            .filter(|instance| instance.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn playground_put(&self, playground: Playground) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .playgrounds
            .insert(playground.id.clone(), playground);
        Ok(())
    }

    async fn playground_get(&self, id: &str) -> StoreResult<Playground> {
        self.tables
            .read()
            .await
            .playgrounds
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("playground", id))
    }

    async fn playground_get_all(&self) -> StoreResult<Vec<Playground>> {
        Ok(self
            .tables
            .read()
            .await
            .playgrounds
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn session(id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: id.into(),
            playground_id: "pg".into(),
            created_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    fn instance(name: &str, session_id: &str) -> Instance {
        Instance {
            name: name.into(),
            session_id: session_id.into(),
            hostname: format!("{name}.local"),
            ip: "10.0.0.2".into(),
            image: "dind".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.session_get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn instances_are_listed_per_session_in_name_order() {
        let store = InMemoryStore::new();
        store.session_put(session("s1")).await.unwrap();
        store.instance_put(instance("node2", "s1")).await.unwrap();
        store.instance_put(instance("node1", "s1")).await.unwrap();
        store.instance_put(instance("other", "s2")).await.unwrap();

        let names: Vec<String> = store
            .instances_by_session("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["node1", "node2"]);
    }

    #[tokio::test]
    async fn deleting_a_session_drops_its_instances() {
        let store = InMemoryStore::new();
        store.session_put(session("s1")).await.unwrap();
        store.instance_put(instance("node1", "s1")).await.unwrap();

        store.session_delete("s1").await.unwrap();

        assert!(store.session_get("s1").await.unwrap_err().is_not_found());
        assert!(store.instance_get("node1").await.unwrap_err().is_not_found());
    }
}
