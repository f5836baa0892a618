//! Durable store access.
//!
//! Every accepted position report is written here before it reaches the
//! in-memory cache, and both the backend warm-up and the viewer's polling
//! fallback read recent rows back from it.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::api::UserProfile;
use crate::types::{PositionRecord, UnitMeta};

pub use memory::MemoryStore;
pub use rest::RestStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected request with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Account row as kept by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: serde_json::Value,
    #[serde(alias = "usuario")]
    pub username: String,
    #[serde(rename = "password", alias = "clave")]
    pub secret: String,
    #[serde(rename = "activo", alias = "active", default = "default_active")]
    pub active: bool,
    #[serde(flatten)]
    pub meta: UnitMeta,
}

fn default_active() -> bool {
    true
}

impl UserRecord {
    /// Public view of the account, without its secret.
    pub fn profile(&self) -> UserProfile {
        let id = match &self.id {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        UserProfile {
            id,
            username: self.username.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// Operations the tracker needs from the durable store.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Persist one position report.
    async fn insert_position(&self, record: &PositionRecord) -> Result<(), StoreError>;

    /// Rows with `ts >= since_ms`, oldest first.
    async fn recent_positions(&self, since_ms: i64) -> Result<Vec<PositionRecord>, StoreError>;

    /// Look up an active account by username.
    async fn find_active_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
}

pub type SharedStore = Arc<dyn PositionStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Rest,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_kind")]
    pub kind: StoreKind,

    /// Base URL of the store's REST API, e.g. `https://xyz.example.co`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_positions_table")]
    pub positions_table: String,

    #[serde(default = "default_users_table")]
    pub users_table: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_kind() -> StoreKind {
    StoreKind::Rest
}

fn default_positions_table() -> String {
    "ubicaciones".to_string()
}

fn default_users_table() -> String {
    "usuarios".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            url: String::new(),
            api_key: String::new(),
            positions_table: default_positions_table(),
            users_table: default_users_table(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Build the store selected by `config.kind`.
pub fn connect(config: &StoreConfig) -> anyhow::Result<SharedStore> {
    match config.kind {
        StoreKind::Rest => {
            if config.url.is_empty() {
                anyhow::bail!("store.url must be set when store.kind = \"rest\"");
            }
            tracing::info!("Using REST store at {}", config.url);
            Ok(Arc::new(RestStore::new(config)?))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; reports will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Group rows by unit, keeping only the most recent row of each.
///
/// Ties on timestamp go to the row that appears later in the input, matching
/// insertion order.
pub fn latest_per_unit(rows: impl IntoIterator<Item = PositionRecord>) -> Vec<PositionRecord> {
    let mut latest: HashMap<String, PositionRecord> = HashMap::new();
    for row in rows {
        match latest.get(&row.unit_id) {
            Some(held) if held.timestamp > row.timestamp => {}
            _ => {
                latest.insert(row.unit_id.clone(), row);
            }
        }
    }
    let mut grouped: Vec<PositionRecord> = latest.into_values().collect();
    grouped.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
    grouped
}
