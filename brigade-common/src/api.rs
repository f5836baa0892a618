//! Request/response bodies of the HTTP API shared by field clients,
//! the backend and the viewer.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::UnitMeta;

/// Position report posted by a field client.
///
/// Phones post whatever their form layer produces, so identifiers may arrive
/// as numbers and coordinates as numeric strings. Anything that cannot be read
/// is left as `None` and rejected during validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub unit_id: Option<String>,

    #[serde(default, alias = "usuario_id", deserialize_with = "lenient_id")]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_coord")]
    pub lat: Option<f64>,

    #[serde(default, deserialize_with = "lenient_coord", alias = "lon")]
    pub lng: Option<f64>,

    #[serde(default, alias = "tecnico")]
    pub display_name: Option<String>,
    #[serde(default, alias = "brigada")]
    pub group: Option<String>,
    #[serde(default, alias = "contrata")]
    pub contractor: Option<String>,
    #[serde(default, alias = "zona")]
    pub zone: Option<String>,
    #[serde(default, alias = "cargo")]
    pub role: Option<String>,

    /// Optional nested form of the metadata, merged under the flat fields
    #[serde(default)]
    pub meta: Option<UnitMeta>,
}

impl IngestRequest {
    /// Unit identity of the report: explicit `unit_id`, else the reporting
    /// user's id. Blank values do not count.
    pub fn resolve_unit_id(&self) -> Option<String> {
        [self.unit_id.as_deref(), self.user_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Merge the flat metadata fields over the nested `meta` object.
    pub fn resolve_meta(&self) -> UnitMeta {
        let nested = self.meta.clone().unwrap_or_default();
        UnitMeta {
            display_name: self.display_name.clone().or(nested.display_name),
            group: self.group.clone().or(nested.group),
            contractor: self.contractor.clone().or(nested.contractor),
            zone: self.zone.clone().or(nested.zone),
            role: self.role.clone().or(nested.role),
        }
    }
}

/// Generic `{ok, error}` reply used by the ingest endpoint and error paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiReply {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "usuario")]
    pub username: String,
    #[serde(alias = "password", alias = "clave")]
    pub secret: String,
}

/// Account data returned to a client after a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub meta: UnitMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginReply {
    pub fn success(user: UserProfile) -> Self {
        Self { ok: true, user: Some(user), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, user: None, error: Some(error.into()) }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Int(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoordRepr {
    Number(f64),
    Text(String),
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr: Option<IdRepr> = Option::deserialize(deserializer).unwrap_or(None);
    Ok(repr.map(|id| match id {
        IdRepr::Text(text) => text,
        IdRepr::Int(n) => n.to_string(),
    }))
}

fn lenient_coord<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr: Option<CoordRepr> = Option::deserialize(deserializer).unwrap_or(None);
    let value = match repr {
        Some(CoordRepr::Number(n)) => Some(n),
        Some(CoordRepr::Text(text)) => text.trim().parse::<f64>().ok(),
        None => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_accepts_strings_and_numbers() {
        let req: IngestRequest = serde_json::from_str(
            r#"{"usuario_id": 42, "lat": "-12.05", "lng": -77.03, "tecnico": "Tech A", "zona": "Norte"}"#,
        )
        .unwrap();

        assert_eq!(req.resolve_unit_id().as_deref(), Some("42"));
        assert_eq!(req.lat, Some(-12.05));
        assert_eq!(req.lng, Some(-77.03));

        let meta = req.resolve_meta();
        assert_eq!(meta.display_name.as_deref(), Some("Tech A"));
        assert_eq!(meta.zone.as_deref(), Some("Norte"));
    }

    #[test]
    fn test_unreadable_fields_become_none() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"unit_id": "  ", "lat": "north", "lng": null}"#).unwrap();

        assert_eq!(req.resolve_unit_id(), None);
        assert_eq!(req.lat, None);
        assert_eq!(req.lng, None);
    }

    #[test]
    fn test_explicit_unit_id_wins_over_user() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"unit_id": "B-07", "user_id": "9", "lat": 1, "lng": 2}"#)
                .unwrap();
        assert_eq!(req.resolve_unit_id().as_deref(), Some("B-07"));
    }

    #[test]
    fn test_flat_meta_overrides_nested() {
        let req: IngestRequest = serde_json::from_str(
            r#"{"unit_id": "U1", "lat": 1, "lng": 2, "contrata": "Flat", "meta": {"contrata": "Nested", "cargo": "Jefe"}}"#,
        )
        .unwrap();

        let meta = req.resolve_meta();
        assert_eq!(meta.contractor.as_deref(), Some("Flat"));
        assert_eq!(meta.role.as_deref(), Some("Jefe"));
    }

    #[test]
    fn test_reply_omits_empty_fields() {
        let json = serde_json::to_string(&ApiReply::success()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);

        let json = serde_json::to_string(&LoginReply::failure("invalid credentials")).unwrap();
        assert_eq!(json, r#"{"ok":false,"error":"invalid credentials"}"#);
    }
}
