use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_DURATION_SECS: u64 = 4 * 60 * 60;

fn default_session_duration_secs() -> u64 {
    DEFAULT_SESSION_DURATION_SECS
}

/// Tenant boundary. `id` is always derived from `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playground {
    #[serde(default)]
    pub id: String,
    pub domain: String,
    #[serde(default = "default_session_duration_secs")]
    pub default_session_duration_secs: u64,
    #[serde(default)]
    pub default_image: Option<String>,
    #[serde(default)]
    pub allow_windows_instances: bool,
}

impl Playground {
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            domain: domain.into(),
            default_session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            default_image: None,
            allow_windows_instances: false,
        }
    }
}

/// Time-boxed allocation inside a playground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub playground_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Running sandbox owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub session_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub image: String,
    pub created_at: DateTime<Utc>,
}
