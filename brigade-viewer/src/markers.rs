//! Viewer-side marker reconciliation.
//!
//! Live updates and polled store rows flow through [`MarkerSet::apply`].
//! Applying is idempotent and order-tolerant: a record older than the one
//! already held for its unit is ignored, so a late poll never drags a marker
//! back to where it used to be. A server snapshot is the exception; it mirrors
//! the server cache and always wins.

use brigade_common::{LatLng, PositionRecord, UnitMeta};
use std::collections::{HashMap, HashSet};

use crate::animation::{Animation, DEFAULT_STEPS};

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Where the marker is currently drawn
    pub rendered: LatLng,
    /// Last position reported for the unit
    pub target: LatLng,
    /// Timestamp of the record `target` came from
    pub ts: i64,
    pub meta: UnitMeta,
    animation: Option<Animation>,
}

impl Marker {
    fn placed(record: &PositionRecord) -> Self {
        Self {
            rendered: record.position(),
            target: record.position(),
            ts: record.timestamp,
            meta: record.meta.clone(),
            animation: None,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }
}

/// What applying one record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// First sighting; drawn directly at its position
    Created,
    /// New target; the marker glides there from where it is drawn now
    Moved,
    /// Same position as the current target; metadata refreshed
    Unchanged,
    /// Older than what is held; ignored
    Stale,
}

/// Summary of a snapshot merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub created: Vec<String>,
    pub moved: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug)]
pub struct MarkerSet {
    markers: HashMap<String, Marker>,
    steps: u32,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}

impl MarkerSet {
    pub fn new(steps: u32) -> Self {
        Self {
            markers: HashMap::new(),
            steps,
        }
    }

    pub fn get(&self, unit_id: &str) -> Option<&Marker> {
        self.markers.get(unit_id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Merge one record into the set.
    pub fn apply(&mut self, record: &PositionRecord) -> Reconciled {
        self.merge(record, false)
    }

    fn merge(&mut self, record: &PositionRecord, authoritative: bool) -> Reconciled {
        let Some(marker) = self.markers.get_mut(&record.unit_id) else {
            self.markers
                .insert(record.unit_id.clone(), Marker::placed(record));
            return Reconciled::Created;
        };

        if !authoritative && record.timestamp < marker.ts {
            return Reconciled::Stale;
        }

        marker.ts = record.timestamp;
        marker.meta = record.meta.clone();

        let target = record.position();
        if target == marker.target {
            return Reconciled::Unchanged;
        }

        // restart from the drawn position, not the old target
        marker.target = target;
        marker.animation = Some(Animation::new(marker.rendered, target, self.steps));
        Reconciled::Moved
    }

    /// Make the set match a server snapshot: units missing from it are
    /// removed and every target is taken from it, even when an earlier
    /// message carried a newer timestamp.
    pub fn apply_snapshot(&mut self, records: &[PositionRecord]) -> SnapshotOutcome {
        let keep: HashSet<&str> = records.iter().map(|r| r.unit_id.as_str()).collect();
        let mut outcome = SnapshotOutcome::default();

        self.markers.retain(|unit_id, _| {
            let kept = keep.contains(unit_id.as_str());
            if !kept {
                outcome.removed.push(unit_id.clone());
            }
            kept
        });

        for record in records {
            match self.merge(record, true) {
                Reconciled::Created => outcome.created.push(record.unit_id.clone()),
                Reconciled::Moved => outcome.moved.push(record.unit_id.clone()),
                Reconciled::Unchanged | Reconciled::Stale => {}
            }
        }
        outcome
    }

    /// Advance every running animation by one frame.
    ///
    /// Returns the markers whose drawn position changed.
    pub fn step(&mut self) -> Vec<(String, LatLng)> {
        let mut moved = Vec::new();
        for (unit_id, marker) in self.markers.iter_mut() {
            let Some(animation) = marker.animation.as_mut() else {
                continue;
            };
            marker.rendered = animation.advance();
            if animation.is_finished() {
                marker.rendered = marker.target;
                marker.animation = None;
            }
            moved.push((unit_id.clone(), marker.rendered));
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unit: &str, lat: f64, lng: f64, ts: i64) -> PositionRecord {
        PositionRecord {
            unit_id: unit.to_string(),
            lat,
            lng,
            timestamp: ts,
            meta: UnitMeta::default(),
        }
    }

    fn run_frames(set: &mut MarkerSet, frames: u32) {
        for _ in 0..frames {
            set.step();
        }
    }

    #[test]
    fn test_first_sighting_is_placed_without_animation() {
        let mut set = MarkerSet::default();
        assert_eq!(set.apply(&record("U1", -12.05, -77.03, 1)), Reconciled::Created);

        let marker = set.get("U1").unwrap();
        assert_eq!(marker.rendered, LatLng::new(-12.05, -77.03));
        assert!(!marker.is_animating());
        assert!(set.step().is_empty());
    }

    #[test]
    fn test_update_glides_to_target() {
        let mut set = MarkerSet::new(15);
        set.apply(&record("U1", -12.05, -77.03, 1));
        assert_eq!(set.apply(&record("U1", -12.06, -77.04, 2)), Reconciled::Moved);

        // target jumps immediately, drawn position does not
        let marker = set.get("U1").unwrap();
        assert_eq!(marker.target, LatLng::new(-12.06, -77.04));
        assert_eq!(marker.rendered, LatLng::new(-12.05, -77.03));

        run_frames(&mut set, 15);
        let marker = set.get("U1").unwrap();
        assert_eq!(marker.rendered, LatLng::new(-12.06, -77.04));
        assert!(!marker.is_animating());
    }

    #[test]
    fn test_mid_animation_update_restarts_from_drawn_position() {
        let mut set = MarkerSet::new(10);
        set.apply(&record("U1", 0.0, 0.0, 1));
        set.apply(&record("U1", 10.0, 0.0, 2));
        run_frames(&mut set, 5);
        let halfway = set.get("U1").unwrap().rendered;
        assert!((halfway.lat - 5.0).abs() < 1e-9);

        set.apply(&record("U1", 10.0, 10.0, 3));
        let moved = set.step();

        // one step from (5, 0) toward (10, 10), never back toward the old target
        let (_, pos) = &moved[0];
        assert!((pos.lat - 5.5).abs() < 1e-9);
        assert!((pos.lng - 1.0).abs() < 1e-9);

        run_frames(&mut set, 9);
        assert_eq!(set.get("U1").unwrap().rendered, LatLng::new(10.0, 10.0));
    }

    #[test]
    fn test_stale_record_does_not_regress() {
        let mut set = MarkerSet::default();
        set.apply(&record("U1", 1.0, 1.0, 200));

        assert_eq!(set.apply(&record("U1", 0.0, 0.0, 100)), Reconciled::Stale);
        assert_eq!(set.get("U1").unwrap().target, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn test_snapshot_overrides_newer_local_target() {
        let mut set = MarkerSet::default();
        set.apply(&record("U1", 2.0, 2.0, 200));
        assert_eq!(set.apply(&record("U1", 1.0, 1.0, 100)), Reconciled::Stale);

        let outcome = set.apply_snapshot(&[record("U1", 1.0, 1.0, 100)]);

        assert_eq!(outcome.moved, vec!["U1".to_string()]);
        let marker = set.get("U1").unwrap();
        assert_eq!(marker.target, LatLng::new(1.0, 1.0));
        assert_eq!(marker.ts, 100);
        // later live updates are judged against the snapshot's timestamp
        assert_eq!(set.apply(&record("U1", 3.0, 3.0, 150)), Reconciled::Moved);
    }

    #[test]
    fn test_reapplying_same_record_is_idempotent() {
        let mut set = MarkerSet::default();
        let r = record("U1", 1.0, 1.0, 200);
        set.apply(&r);

        assert_eq!(set.apply(&r), Reconciled::Unchanged);
        assert!(!set.get("U1").unwrap().is_animating());
    }

    #[test]
    fn test_snapshot_replaces_set() {
        let mut set = MarkerSet::default();
        set.apply(&record("gone", 0.0, 0.0, 1));
        set.apply(&record("U1", 0.0, 0.0, 1));

        let outcome = set.apply_snapshot(&[
            record("U1", 1.0, 1.0, 5),
            record("U2", 2.0, 2.0, 5),
        ]);

        assert_eq!(outcome.removed, vec!["gone".to_string()]);
        assert_eq!(outcome.created, vec!["U2".to_string()]);
        assert_eq!(outcome.moved, vec!["U1".to_string()]);
        assert_eq!(set.len(), 2);
        // new units appear in place
        assert_eq!(set.get("U2").unwrap().rendered, LatLng::new(2.0, 2.0));
        assert_eq!(set.get("U1").unwrap().target, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn test_metadata_follows_latest_record() {
        let mut set = MarkerSet::default();
        set.apply(&record("U1", 0.0, 0.0, 1));
        let mut newer = record("U1", 0.0, 0.0, 2);
        newer.meta.zone = Some("Sur".to_string());
        set.apply(&newer);

        assert_eq!(set.get("U1").unwrap().meta.zone.as_deref(), Some("Sur"));
    }
}
