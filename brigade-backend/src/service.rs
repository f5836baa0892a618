use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use brigade_common::SharedStore;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{ingest_handler, login_handler};
use crate::live::LiveState;
use crate::live::socket::live_channel;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveState>,
    pub store: SharedStore,
}

impl AppState {
    pub fn new(live: Arc<LiveState>, store: SharedStore) -> Self {
        Self { live, store }
    }
}

#[derive(Debug, Serialize)]
struct StatsBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    units: usize,
    sessions: usize,
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Cache and session counts
async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsBody {
        status: "running",
        service: "brigade-backend",
        version: env!("CARGO_PKG_VERSION"),
        units: state.live.unit_count().await,
        sessions: state.live.hub().session_count().await,
    })
}

pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/api/positions", post(ingest_handler))
        .route("/api/login", post(login_handler))
        .route("/ws", get(live_channel))
        .with_state(state);

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
