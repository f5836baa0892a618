use brigade_common::PositionRecord;
use std::collections::HashMap;

/// Last known position of every unit seen since startup.
///
/// Plain data; callers share it behind the lock held by
/// [`LiveState`](super::state::LiveState).
#[derive(Debug, Default, Clone)]
pub struct PositionCache {
    units: HashMap<String, PositionRecord>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `record.unit_id` unconditionally.
    ///
    /// Returns the record it replaced, if any.
    pub fn put(&mut self, record: PositionRecord) -> Option<PositionRecord> {
        self.units.insert(record.unit_id.clone(), record)
    }

    /// Immutable copy of the whole mapping.
    pub fn snapshot(&self) -> HashMap<String, PositionRecord> {
        self.units.clone()
    }

    pub fn get(&self, unit_id: &str) -> Option<&PositionRecord> {
        self.units.get(unit_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &PositionRecord> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drop units whose last report is older than `cutoff_ms`.
    ///
    /// Returns the ids that were removed.
    pub fn evict_older_than(&mut self, cutoff_ms: i64) -> Vec<String> {
        let stale: Vec<String> = self
            .units
            .values()
            .filter(|record| record.timestamp < cutoff_ms)
            .map(|record| record.unit_id.clone())
            .collect();
        for unit_id in &stale {
            self.units.remove(unit_id);
        }
        stale
    }
}
