//! Certification handler
//!
//! Runs a trust request through the certifier and returns the signed
//! artifact on success.

use axum::{extract::State, Json};
use std::sync::Arc;

use certifier_core::Certifier;

use crate::api::error::ApiError;
use crate::core::evaluate_request;
use crate::events::EventLog;
use crate::keys::PolicyAuthority;
use crate::protocol::{TrustRequest, TrustResponse};

/// Application state shared across handlers and framed connections
pub struct AppState {
    /// Proof construction and replay against the loaded policy
    pub certifier: Arc<Certifier>,
    /// Policy key and serial counter for issued artifacts
    pub authority: PolicyAuthority,
    /// Record of every evaluated request
    pub events: Arc<dyn EventLog>,
}

impl AppState {
    pub fn new(certifier: Certifier, authority: PolicyAuthority, events: Arc<dyn EventLog>) -> Self {
        Self {
            certifier: Arc::new(certifier),
            authority,
            events,
        }
    }
}

/// Certify the providing enclave
///
/// POST /v1/certify
///
/// Evaluation failures are not HTTP errors: they return 200 with status
/// `failed`. Only an unusable request body is rejected.
pub async fn certify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrustRequest>,
) -> Result<Json<TrustResponse>, ApiError> {
    if request.submitted_evidence_type.trim().is_empty() {
        return Err(ApiError::BadRequest("submitted_evidence_type cannot be empty".into()));
    }

    Ok(Json(evaluate_request(&state, &request).await))
}
