use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{PositionStore, StoreError, UserRecord};
use crate::types::PositionRecord;

/// In-process store for local runs and tests.
///
/// `set_available(false)` simulates an outage: every call fails with
/// [`StoreError::Unavailable`] until the store is made available again.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<PositionRecord>>,
    users: RwLock<Vec<UserRecord>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn add_user(&self, user: UserRecord) {
        self.users.write().await.push(user);
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn insert_position(&self, record: &PositionRecord) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.rows.write().await.push(record.clone());
        Ok(())
    }

    async fn recent_positions(&self, since_ms: i64) -> Result<Vec<PositionRecord>, StoreError> {
        self.ensure_available()?;
        let mut rows: Vec<PositionRecord> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| row.timestamp >= since_ms)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        rows.sort_by_key(|row| row.timestamp);
        Ok(rows)
    }

    async fn find_active_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.active && user.username == username)
            .cloned())
    }
}
