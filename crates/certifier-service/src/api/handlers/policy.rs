//! Policy key and event inspection handlers

use axum::{
    extract::{Query, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use certifier_core::PublicKey;

use crate::api::error::ApiError;
use crate::api::handlers::certify::AppState;
use crate::events::{LoggedEvent, MAX_RECENT_EVENTS};

/// Policy key published to relying parties
#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyKeyResponse {
    pub kid: String,
    /// Base64-encoded Ed25519 public key (32 bytes)
    pub public_key: String,
    pub algorithm: String,
}

/// Get the policy key
///
/// GET /v1/policy/key
///
/// Relying parties use this key to verify admission credentials and
/// platform rules.
pub async fn get_policy_key(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PolicyKeyResponse>, ApiError> {
    let public_key = PublicKey::from_entity(&state.authority.policy_key())
        .map_err(|e| ApiError::Internal(format!("Policy key unusable: {}", e)))?;

    Ok(Json(PolicyKeyResponse {
        kid: state.authority.kid().to_string(),
        public_key: STANDARD.encode(public_key.to_bytes()),
        algorithm: "EdDSA".into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct RecentEventsResponse {
    pub events: Vec<LoggedEvent>,
    pub count: usize,
}

/// List recent certification events, newest last
///
/// GET /v1/events?limit=N
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentEventsQuery>,
) -> Result<Json<RecentEventsResponse>, ApiError> {
    if query.limit > MAX_RECENT_EVENTS {
        return Err(ApiError::BadRequest(format!(
            "limit cannot exceed {}",
            MAX_RECENT_EVENTS
        )));
    }

    let events = state.events.recent(query.limit).await?;

    Ok(Json(RecentEventsResponse {
        count: events.len(),
        events,
    }))
}
