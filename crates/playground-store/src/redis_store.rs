use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::{Instance, Playground, PlaygroundStore, Session, StoreError, StoreResult};

const PREFIX: &str = "pgroad";
const SESSION_IDS: &str = "pgroad:session_ids";
const PLAYGROUND_IDS: &str = "pgroad:playground_ids";

fn session_key(id: &str) -> String {
    format!("{PREFIX}:session:{id}")
}

fn session_instances_key(session_id: &str) -> String {
    format!("{PREFIX}:session:{session_id}:instances")
}

fn instance_key(name: &str) -> String {
    format!("{PREFIX}:instance:{name}")
}

fn playground_key(id: &str) -> String {
    format!("{PREFIX}:playground:{id}")
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Redis adapter. Records are JSON strings; sets index sessions, playgrounds
/// and the instances of each session.
pub struct RedisStore {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Validates the URL only. The connection is opened on first use and
    /// shared afterwards; the manager reconnects on its own.
    pub fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(backend)?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    async fn conn(&self) -> StoreResult<ConnectionManager> {
        self.manager
            .get_or_try_init(|| self.client.get_connection_manager())
            .await
            .cloned()
            .map_err(backend)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        conn: &mut ConnectionManager,
        kind: &'static str,
        id: &str,
        key: &str,
    ) -> StoreResult<T> {
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(conn)
            .await
            .map_err(backend)?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(StoreError::not_found(kind, id)),
        }
    }

    /// Loads every record referenced by `index`, skipping ids whose record
    /// has gone away or no longer parses.
    async fn load_indexed<T: DeserializeOwned>(
        &self,
        conn: &mut ConnectionManager,
        index: &str,
        key_for: fn(&str) -> String,
    ) -> StoreResult<Vec<T>> {
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(index)
            .query_async(conn)
            .await
            .map_err(backend)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let raw: Option<String> = redis::cmd("GET")
                .arg(key_for(&id))
                .query_async(conn)
                .await
                .map_err(backend)?;
            let Some(json) = raw else { continue };
            match serde_json::from_str::<T>(&json) {
                Ok(value) => out.push(value),
                Err(err) => warn!(index, %id, error = %err, "skipping unreadable record"),
            }
        }
        Ok(out)
    }

    async fn put_indexed<T: Serialize>(
        &self,
        key: &str,
        index: &str,
        member: &str,
        value: &T,
    ) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(value)?;
        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(payload)
            .ignore()
            .cmd("SADD")
            .arg(index)
            .arg(member)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl PlaygroundStore for RedisStore {
    async fn session_get(&self, id: &str) -> StoreResult<Session> {
        let mut conn = self.conn().await?;
        self.get_json(&mut conn, "session", id, &session_key(id))
            .await
    }

    async fn session_put(&self, session: Session) -> StoreResult<()> {
        self.put_indexed(&session_key(&session.id), SESSION_IDS, &session.id, &session)
            .await
    }

    async fn session_delete(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let instances_key = session_instances_key(id);
        let names: Vec<String> = redis::cmd("SMEMBERS")
            .arg(&instances_key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for name in &names {
            pipe.cmd("DEL").arg(instance_key(name)).ignore();
        }
        pipe.cmd("DEL")
            .arg(&instances_key)
            .ignore()
            .cmd("DEL")
            .arg(session_key(id))
            .ignore()
            .cmd("SREM")
            .arg(SESSION_IDS)
            .arg(id)
            .ignore();
        let _: () = pipe.query_async(&mut conn).await.map_err(backend)?;
        Ok(())
    }

    async fn session_get_all(&self) -> StoreResult<Vec<Session>> {
        let mut conn = self.conn().await?;
        self.load_indexed(&mut conn, SESSION_IDS, session_key).await
    }

    async fn instance_get(&self, name: &str) -> StoreResult<Instance> {
        let mut conn = self.conn().await?;
        self.get_json(&mut conn, "instance", name, &instance_key(name))
            .await
    }

    async fn instance_put(&self, instance: Instance) -> StoreResult<()> {
        self.put_indexed(
            &instance_key(&instance.name),
            &session_instances_key(&instance.session_id),
            &instance.name,
            &instance,
        )
        .await
    }

    async fn instance_delete(&self, name: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let instance: Instance = match self
            .get_json(&mut conn, "instance", name, &instance_key(name))
            .await
        {
            Ok(instance) => instance,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(instance_key(name))
            .ignore()
            .cmd("SREM")
            .arg(session_instances_key(&instance.session_id))
            .arg(name)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn instances_by_session(&self, session_id: &str) -> StoreResult<Vec<Instance>> {
        let mut conn = self.conn().await?;
        let mut instances: Vec<Instance> = self
            .load_indexed(&mut conn, &session_instances_key(session_id), instance_key)
            .await?;
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    async fn playground_put(&self, playground: Playground) -> StoreResult<()> {
        self.put_indexed(
            &playground_key(&playground.id),
            PLAYGROUND_IDS,
            &playground.id,
            &playground,
        )
        .await
    }

    async fn playground_get(&self, id: &str) -> StoreResult<Playground> {
        let mut conn = self.conn().await?;
        self.get_json(&mut conn, "playground", id, &playground_key(id))
            .await
    }

    async fn playground_get_all(&self) -> StoreResult<Vec<Playground>> {
        let mut conn = self.conn().await?;
        self.load_indexed(&mut conn, PLAYGROUND_IDS, playground_key)
            .await
    }
}
