//! HTTP API for the certifier service

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub policy_kid: String,
    pub policy_statements: usize,
    pub measurement_policies: usize,
    pub platform_key_policies: usize,
    pub feature_policies: usize,
    pub events_recorded: u64,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
///
/// Not ready while the policy holds no measurement policy, since no request
/// can succeed.
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let index = state.certifier.index();
    let events_recorded = state.events.count().await.unwrap_or(0);

    Json(ReadyResponse {
        ready: index.measurement_count() > 0,
        policy_kid: state.authority.kid().to_string(),
        policy_statements: index.len(),
        measurement_policies: index.measurement_count(),
        platform_key_policies: index.platform_key_count(),
        feature_policies: index.feature_count(),
        events_recorded,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/v1/policy/key", get(handlers::get_policy_key))
        .route("/v1/events", get(handlers::list_events))
        .route("/v1/certify", post(handlers::certify))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
