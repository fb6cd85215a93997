//! Trust request evaluation
//!
//! One request runs: construct proof → replay proof → issue artifact →
//! record event. Any failure is terminal; the response is `failed` with no
//! artifact, and the category goes into the event message.

use certifier_core::{
    credential::subject_label, Certification, CertifierError, Purpose, Result,
};
use tracing::{info, warn};

use crate::api::handlers::AppState;
use crate::events::{CertificationEvent, EventOutcome};
use crate::protocol::{TrustRequest, TrustResponse};

/// An artifact signed by the policy authority
#[derive(Debug, Clone)]
pub struct IssuedArtifact {
    pub serial_number: u64,
    pub kind: &'static str,
    /// COSE_Sign1 bytes
    pub bytes: Vec<u8>,
}

/// Evaluate a trust request and record the outcome
///
/// Never fails: every error becomes a `failed` response.
pub async fn evaluate_request(state: &AppState, request: &TrustRequest) -> TrustResponse {
    let (response, outcome, message) = match certify(state, request) {
        Ok(artifact) => {
            info!(
                requesting = %request.requesting_enclave_tag,
                providing = %request.providing_enclave_tag,
                evidence_type = %request.submitted_evidence_type,
                serial = artifact.serial_number,
                kind = artifact.kind,
                "Trust request succeeded"
            );
            (
                TrustResponse::succeeded(request, &artifact.bytes),
                EventOutcome::Succeeded,
                format!("issued {} {}", artifact.kind, artifact.serial_number),
            )
        }
        Err(e) => {
            warn!(
                requesting = %request.requesting_enclave_tag,
                providing = %request.providing_enclave_tag,
                evidence_type = %request.submitted_evidence_type,
                category = %e.category(),
                error = %e,
                "Trust request failed"
            );
            (
                TrustResponse::failed(request),
                EventOutcome::Failed,
                format!("{}: {}", e.category(), e),
            )
        }
    };

    let event = CertificationEvent::new(
        request.requesting_enclave_tag.clone(),
        request.providing_enclave_tag.clone(),
        request.submitted_evidence_type.clone(),
        outcome,
        message,
    )
    .with_payloads(
        serde_json::to_vec(request).unwrap_or_default(),
        serde_json::to_vec(&response).unwrap_or_default(),
    );
    if let Err(e) = state.events.record(event).await {
        warn!(error = %e, "Failed to record certification event");
    }

    response
}

/// Build, replay and issue, stopping at the first error
pub fn certify(state: &AppState, request: &TrustRequest) -> Result<IssuedArtifact> {
    let certification = state.certifier.construct_proof(
        &request.submitted_evidence_type,
        &request.support,
        request.purpose.as_deref(),
    )?;
    state.certifier.verify(&certification)?;
    issue(state, &certification)
}

fn issue(state: &AppState, certification: &Certification) -> Result<IssuedArtifact> {
    let subject = certification
        .subject_key()
        .ok_or_else(|| CertifierError::ProofUnsound("goal subject is not a key".into()))?;

    match certification.purpose {
        Purpose::Authentication => {
            let label = subject_label(subject, certification.measurement());
            let signed = state
                .authority
                .issue_admission_credential(subject, &label, certification.purpose)?;
            Ok(IssuedArtifact {
                serial_number: signed.extract()?.serial_number,
                kind: "admission credential",
                bytes: signed.to_bytes()?,
            })
        }
        Purpose::Attestation => {
            let signed = state.authority.issue_platform_rule(subject)?;
            Ok(IssuedArtifact {
                serial_number: signed.extract()?.serial_number,
                kind: "platform rule",
                bytes: signed.to_bytes()?,
            })
        }
    }
}
