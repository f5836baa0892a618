use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptive metadata attached to every position report.
///
/// Wire names follow the field clients (`tecnico`, `brigada`, `contrata`,
/// `zona`, `cargo`) and are carried through the live channel untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMeta {
    #[serde(rename = "tecnico", alias = "display_name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(rename = "brigada", alias = "group", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(rename = "contrata", alias = "contractor", default, skip_serializing_if = "Option::is_none")]
    pub contractor: Option<String>,

    #[serde(rename = "zona", alias = "zone", default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(rename = "cargo", alias = "role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A plain latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Last reported position of one unit.
///
/// Records are never mutated; a newer report for the same unit produces a new
/// record that replaces the old one wherever it is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub unit_id: String,
    pub lat: f64,
    pub lng: f64,
    /// Server arrival time, epoch milliseconds
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(default)]
    pub meta: UnitMeta,
}

impl PositionRecord {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Position entry as carried inside a snapshot (keyed by unit id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePosition {
    pub lat: f64,
    pub lng: f64,
    pub ts: i64,
    #[serde(default)]
    pub meta: UnitMeta,
}

/// Single-unit payload of a `point` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointUpdate {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub ts: i64,
    #[serde(default)]
    pub meta: UnitMeta,
}

/// Messages pushed from the server to viewer sessions over the live channel.
///
/// Serialized as `{"type": "snapshot", "data": {...}}` and
/// `{"type": "point", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LiveMessage {
    #[serde(rename = "snapshot")]
    Snapshot(HashMap<String, LivePosition>),
    #[serde(rename = "point")]
    Point(PointUpdate),
}

impl LiveMessage {
    pub fn snapshot<'a>(records: impl IntoIterator<Item = &'a PositionRecord>) -> Self {
        let data = records
            .into_iter()
            .map(|record| (record.unit_id.clone(), LivePosition::from(record)))
            .collect();
        LiveMessage::Snapshot(data)
    }

    pub fn point(record: &PositionRecord) -> Self {
        LiveMessage::Point(PointUpdate::from(record))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LiveMessage::Snapshot(_) => "snapshot",
            LiveMessage::Point(_) => "point",
        }
    }

    /// Flatten the message back into position records.
    pub fn into_records(self) -> Vec<PositionRecord> {
        match self {
            LiveMessage::Snapshot(data) => data
                .into_iter()
                .map(|(unit_id, pos)| PositionRecord {
                    unit_id,
                    lat: pos.lat,
                    lng: pos.lng,
                    timestamp: pos.ts,
                    meta: pos.meta,
                })
                .collect(),
            LiveMessage::Point(point) => vec![PositionRecord::from(point)],
        }
    }
}

impl From<&PositionRecord> for LivePosition {
    fn from(record: &PositionRecord) -> Self {
        Self {
            lat: record.lat,
            lng: record.lng,
            ts: record.timestamp,
            meta: record.meta.clone(),
        }
    }
}

impl From<&PositionRecord> for PointUpdate {
    fn from(record: &PositionRecord) -> Self {
        Self {
            id: record.unit_id.clone(),
            lat: record.lat,
            lng: record.lng,
            ts: record.timestamp,
            meta: record.meta.clone(),
        }
    }
}

impl From<PointUpdate> for PositionRecord {
    fn from(point: PointUpdate) -> Self {
        Self {
            unit_id: point.id,
            lat: point.lat,
            lng: point.lng,
            timestamp: point.ts,
            meta: point.meta,
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
