//! PostgREST-style HTTPS client for the durable store.
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{PositionStore, StoreConfig, StoreError, UserRecord};
use crate::types::{PositionRecord, UnitMeta};

/// Flat row layout of the positions table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PositionRow {
    unit_id: String,
    lat: f64,
    lng: f64,
    ts: i64,
    #[serde(flatten)]
    meta: UnitMeta,
}

impl From<&PositionRecord> for PositionRow {
    fn from(record: &PositionRecord) -> Self {
        Self {
            unit_id: record.unit_id.clone(),
            lat: record.lat,
            lng: record.lng,
            ts: record.timestamp,
            meta: record.meta.clone(),
        }
    }
}

impl From<PositionRow> for PositionRecord {
    fn from(row: PositionRow) -> Self {
        Self {
            unit_id: row.unit_id,
            lat: row.lat,
            lng: row.lng,
            timestamp: row.ts,
            meta: row.meta,
        }
    }
}

pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    positions_table: String,
    users_table: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("brigade-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build store HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            positions_table: config.positions_table.clone(),
            users_table: config.users_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn recent_positions_url(&self, since_ms: i64) -> String {
        format!(
            "{}?select=*&ts=gte.{}&order=ts.asc",
            self.table_url(&self.positions_table),
            since_ms
        )
    }

    fn active_user_url(&self, username: &str) -> String {
        format!(
            "{}?select=*&username=eq.{}&activo=eq.true&limit=1",
            self.table_url(&self.users_table),
            urlencoding::encode(username)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PositionStore for RestStore {
    async fn insert_position(&self, record: &PositionRecord) -> Result<(), StoreError> {
        let row = PositionRow::from(record);
        let response = self
            .authorize(self.client.post(self.table_url(&self.positions_table)))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        Self::check(response).await?;

        tracing::debug!("Stored position for unit {}", record.unit_id);
        Ok(())
    }

    async fn recent_positions(&self, since_ms: i64) -> Result<Vec<PositionRecord>, StoreError> {
        let url = self.recent_positions_url(since_ms);
        let response = self.authorize(self.client.get(url)).send().await?;
        let body = Self::check(response).await?.text().await?;

        let rows: Vec<PositionRow> = serde_json::from_str(&body)?;
        tracing::debug!("Fetched {} position rows since {}", rows.len(), since_ms);
        Ok(rows.into_iter().map(PositionRecord::from).collect())
    }

    async fn find_active_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let url = self.active_user_url(username);
        let response = self.authorize(self.client.get(url)).send().await?;
        let body = Self::check(response).await?.text().await?;

        let mut users: Vec<UserRecord> = serde_json::from_str(&body)?;
        Ok(users.pop())
    }
}
