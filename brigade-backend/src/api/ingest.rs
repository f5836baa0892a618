use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use brigade_common::{ApiReply, IngestRequest, PositionRecord, PositionStore, now_millis};
use tracing::{error, info, warn};

use super::error::IngestError;
use crate::live::LiveState;
use crate::service::AppState;

/// Turn a raw report into a record stamped with the server's arrival time.
pub fn validate(request: &IngestRequest, received_at: i64) -> Result<PositionRecord, IngestError> {
    let unit_id = request
        .resolve_unit_id()
        .ok_or_else(|| IngestError::Validation("missing unit_id".to_string()))?;
    let lat = request
        .lat
        .ok_or_else(|| IngestError::Validation("missing or invalid lat".to_string()))?;
    let lng = request
        .lng
        .ok_or_else(|| IngestError::Validation("missing or invalid lng".to_string()))?;

    Ok(PositionRecord {
        unit_id,
        lat,
        lng,
        timestamp: received_at,
        meta: request.resolve_meta(),
    })
}

/// Validate, persist, cache, broadcast, in that order.
///
/// The cache and viewers only ever see reports the store has accepted.
pub async fn ingest(
    store: &dyn PositionStore,
    live: &LiveState,
    request: &IngestRequest,
) -> Result<PositionRecord, IngestError> {
    let record = validate(request, now_millis())?;

    store.insert_position(&record).await?;

    let delivered = live.record(record.clone()).await;
    info!(
        "Position for {} at ({}, {}) sent to {} viewers",
        record.unit_id, record.lat, record.lng, delivered
    );
    Ok(record)
}

/// `POST /api/positions`
pub async fn ingest_handler(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected position report: {}", rejection.body_text());
            return IngestError::Validation(rejection.body_text()).into_response();
        }
    };

    match ingest(state.store.as_ref(), &state.live, &request).await {
        Ok(_) => Json(ApiReply::success()).into_response(),
        Err(e) => {
            match &e {
                IngestError::Validation(reason) => warn!("Rejected position report: {}", reason),
                IngestError::Persistence(cause) => error!("Position not stored: {}", cause),
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::Outbound;
    use async_trait::async_trait;
    use brigade_common::LiveMessage;
    use brigade_common::store::{MemoryStore, StoreError, UserRecord};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn request(json: &str) -> IngestRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_validate_requires_identity_and_coordinates() {
        let missing_id = request(r#"{"lat": 1.0, "lng": 2.0}"#);
        assert!(matches!(validate(&missing_id, 0), Err(IngestError::Validation(_))));

        let missing_lng = request(r#"{"unit_id": "U1", "lat": 1.0}"#);
        assert!(matches!(validate(&missing_lng, 0), Err(IngestError::Validation(_))));

        // no range checks
        let odd = request(r#"{"unit_id": "U1", "lat": 123.0, "lng": -500.0}"#);
        let record = validate(&odd, 77).unwrap();
        assert_eq!((record.lat, record.lng, record.timestamp), (123.0, -500.0, 77));
    }

    #[tokio::test]
    async fn test_successful_ingest_persists_caches_and_broadcasts() {
        let store = MemoryStore::new();
        let live = LiveState::new(8);
        let mut session = live.connect().await;
        session.rx.recv().await;

        let req = request(
            r#"{"unit_id": "U1", "lat": -12.05, "lng": -77.03, "tecnico": "Tech A", "zona": "Norte", "contrata": "ACME"}"#,
        );
        ingest(&store, &live, &req).await.unwrap();

        assert_eq!(store.row_count().await, 1);
        assert_eq!(live.unit_count().await, 1);
        match session.rx.recv().await {
            Some(Outbound::Message(msg)) => match &*msg {
                LiveMessage::Point(point) => {
                    assert_eq!(point.id, "U1");
                    assert_eq!(point.meta.display_name.as_deref(), Some("Tech A"));
                    assert_eq!(point.meta.zone.as_deref(), Some("Norte"));
                    assert_eq!(point.meta.contractor.as_deref(), Some("ACME"));
                }
                other => panic!("expected point, got {:?}", other),
            },
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_outage_leaves_cache_and_viewers_untouched() {
        let store = MemoryStore::new();
        let live = LiveState::new(8);
        ingest(&store, &live, &request(r#"{"unit_id": "U1", "lat": 1.0, "lng": 1.0}"#))
            .await
            .unwrap();

        let mut session = live.connect().await;
        session.rx.recv().await;
        store.set_available(false);

        let result = ingest(&store, &live, &request(r#"{"unit_id": "U1", "lat": 9.0, "lng": 9.0}"#)).await;

        assert!(matches!(result, Err(IngestError::Persistence(_))));
        assert_eq!(live.snapshot().await["U1"].lat, 1.0);
        assert!(session.rx.try_recv().is_err());
    }

    /// Store whose first insert takes a while, so two overlapping reports
    /// finish persisting in the reverse of their arrival order.
    struct SlowFirstInsert {
        inner: MemoryStore,
        first: AtomicBool,
    }

    #[async_trait]
    impl PositionStore for SlowFirstInsert {
        async fn insert_position(&self, record: &PositionRecord) -> Result<(), StoreError> {
            if self.first.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            self.inner.insert_position(record).await
        }

        async fn recent_positions(&self, since_ms: i64) -> Result<Vec<PositionRecord>, StoreError> {
            self.inner.recent_positions(since_ms).await
        }

        async fn find_active_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
            self.inner.find_active_user(username).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_reports_keep_newest_position() {
        let store = Arc::new(SlowFirstInsert {
            inner: MemoryStore::new(),
            first: AtomicBool::new(true),
        });
        let live = Arc::new(LiveState::new(8));
        let mut session = live.connect().await;
        session.rx.recv().await;

        let slow = {
            let (store, live) = (store.clone(), live.clone());
            tokio::spawn(async move {
                ingest(store.as_ref(), &live, &request(r#"{"unit_id": "U1", "lat": 1.0, "lng": 1.0}"#)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fast = ingest(store.as_ref(), &live, &request(r#"{"unit_id": "U1", "lat": 2.0, "lng": 2.0}"#))
            .await
            .unwrap();
        let slow = slow.await.unwrap().unwrap();
        assert!(slow.timestamp < fast.timestamp);

        // both rows are stored, the cache holds the newest
        assert_eq!(store.inner.row_count().await, 2);
        let cached = live.snapshot().await["U1"].clone();
        assert_eq!((cached.lat, cached.timestamp), (2.0, fast.timestamp));

        // and viewers heard only about the newest
        match session.rx.try_recv() {
            Ok(Outbound::Message(msg)) => match &*msg {
                LiveMessage::Point(point) => assert_eq!(point.lat, 2.0),
                other => panic!("expected point, got {:?}", other),
            },
            other => panic!("expected message, got {:?}", other),
        }
        assert!(session.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_report_has_no_side_effects() {
        let store = MemoryStore::new();
        let live = LiveState::new(8);

        let result = ingest(&store, &live, &request(r#"{"unit_id": "U1", "lat": "abc", "lng": 1.0}"#)).await;

        assert!(matches!(result, Err(IngestError::Validation(_))));
        assert_eq!(store.row_count().await, 0);
        assert_eq!(live.unit_count().await, 0);
    }
}
