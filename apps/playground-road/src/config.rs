use std::net::SocketAddr;
use std::time::Duration;

use playground_store::DEFAULT_SESSION_DURATION_SECS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PLAYGROUND_ROAD_ADDR={value} is not a socket address: {source}")]
    InvalidAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,
    pub playground_domain: String,
    pub default_session_duration_secs: u64,
    pub store_call_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unparseable numbers fall back
    /// to their defaults; only the bind address is fatal.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = var("PLAYGROUND_ROAD_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into());
        let bind_addr = addr
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                value: addr.clone(),
                source,
            })?;
        let log_filter = var("RUST_LOG").unwrap_or_else(|| "info,playground_road=debug".into());
        let redis_url = var("REDIS_URL").filter(|v| !v.is_empty());
        let store_backend = StoreBackend::parse(var("STORE_BACKEND").as_deref());
        let playground_domain = var("PLAYGROUND_DOMAIN")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "localhost".into());
        let default_session_duration_secs = var("DEFAULT_SESSION_DURATION_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SESSION_DURATION_SECS);
        let store_call_timeout_ms = var("STORE_CALL_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5_000);
        Ok(Self {
            bind_addr,
            log_filter,
            store_backend,
            redis_url,
            playground_domain,
            default_session_duration_secs,
            store_call_timeout_ms,
        })
    }

    /// `None` when the timeout is disabled with `0`.
    pub fn store_call_timeout(&self) -> Option<Duration> {
        (self.store_call_timeout_ms > 0).then(|| Duration::from_millis(self.store_call_timeout_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Redis,
}

impl StoreBackend {
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("memory") {
            "redis" => StoreBackend::Redis,
            _ => StoreBackend::InMemory,
        }
    }
}
