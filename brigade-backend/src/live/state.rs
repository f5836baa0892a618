use brigade_common::{LiveMessage, PositionRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::cache::PositionCache;
use super::hub::{SessionHub, ViewerSession};

/// Owned live state: the position cache plus the viewer sessions it feeds.
///
/// Lock order is always cache, then sessions. Publishing happens while the
/// cache write lock is held and attaching while its read lock is held, so a
/// new viewer sees each report exactly once: either inside its snapshot or
/// as a later update.
pub struct LiveState {
    cache: RwLock<PositionCache>,
    hub: SessionHub,
}

impl LiveState {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            cache: RwLock::new(PositionCache::new()),
            hub: SessionHub::new(queue_capacity),
        }
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    /// Store `record` as the unit's latest position and fan it out.
    ///
    /// A record older than the one already held is persisted history only:
    /// it neither replaces the cache entry nor reaches viewers, so the cache
    /// stays equal to the newest stored row per unit however the persists
    /// interleave.
    ///
    /// Returns the number of sessions the update was queued for.
    pub async fn record(&self, record: PositionRecord) -> usize {
        let mut cache = self.cache.write().await;
        if let Some(held) = cache.get(&record.unit_id) {
            if held.timestamp > record.timestamp {
                debug!(
                    "Superseded report for {} (ts {} < {}) not broadcast",
                    record.unit_id, record.timestamp, held.timestamp
                );
                return 0;
            }
        }

        let update = LiveMessage::point(&record);
        cache.put(record);
        self.hub.publish(update).await
    }

    /// Open a viewer session seeded with the current snapshot.
    pub async fn connect(&self) -> ViewerSession {
        let cache = self.cache.read().await;
        let snapshot = LiveMessage::snapshot(cache.records());
        self.hub.attach(snapshot).await
    }

    /// Seed the cache without notifying anyone. Used at startup.
    pub async fn seed(&self, records: impl IntoIterator<Item = PositionRecord>) -> usize {
        let mut cache = self.cache.write().await;
        for record in records {
            cache.put(record);
        }
        cache.len()
    }

    /// Forget units not heard from since `cutoff_ms`.
    ///
    /// Sessions are not told; the units simply stop appearing in snapshots.
    pub async fn evict_stale(&self, cutoff_ms: i64) -> Vec<String> {
        let evicted = self.cache.write().await.evict_older_than(cutoff_ms);
        if !evicted.is_empty() {
            info!("Evicted {} stale units from the position cache", evicted.len());
        }
        evicted
    }

    pub async fn snapshot(&self) -> HashMap<String, PositionRecord> {
        self.cache.read().await.snapshot()
    }

    pub async fn unit_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
