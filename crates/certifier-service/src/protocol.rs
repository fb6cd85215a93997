//! Wire records exchanged with enclaves
//!
//! Both transports (HTTP and framed TCP) carry the same JSON records.

use base64::{engine::general_purpose::STANDARD, Engine};
use certifier_core::EvidencePackage;
use serde::{Deserialize, Serialize};

/// A request to certify the providing enclave's key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRequest {
    pub requesting_enclave_tag: String,
    pub providing_enclave_tag: String,
    /// `authentication` (default) or `attestation`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub submitted_evidence_type: String,
    pub support: EvidencePackage,
}

impl TrustRequest {
    pub fn new(
        requesting_enclave_tag: impl Into<String>,
        providing_enclave_tag: impl Into<String>,
        submitted_evidence_type: impl Into<String>,
        support: EvidencePackage,
    ) -> Self {
        Self {
            requesting_enclave_tag: requesting_enclave_tag.into(),
            providing_enclave_tag: providing_enclave_tag.into(),
            purpose: None,
            submitted_evidence_type: submitted_evidence_type.into(),
            support,
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStatus {
    Succeeded,
    Failed,
}

/// Outcome of a trust request
///
/// `artifact` is the base64 COSE_Sign1 encoding of the issued admission
/// credential or platform rule, present only on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustResponse {
    pub requesting_enclave_tag: String,
    pub providing_enclave_tag: String,
    pub status: TrustStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl TrustResponse {
    pub fn succeeded(request: &TrustRequest, artifact: &[u8]) -> Self {
        Self {
            requesting_enclave_tag: request.requesting_enclave_tag.clone(),
            providing_enclave_tag: request.providing_enclave_tag.clone(),
            status: TrustStatus::Succeeded,
            artifact: Some(STANDARD.encode(artifact)),
        }
    }

    pub fn failed(request: &TrustRequest) -> Self {
        Self {
            requesting_enclave_tag: request.requesting_enclave_tag.clone(),
            providing_enclave_tag: request.providing_enclave_tag.clone(),
            status: TrustStatus::Failed,
            artifact: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TrustStatus::Succeeded
    }

    /// Decoded artifact bytes
    pub fn artifact_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.artifact.as_deref().map(|encoded| STANDARD.decode(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_defaults_when_absent() {
        let json = r#"{
            "requesting_enclave_tag": "client",
            "providing_enclave_tag": "server",
            "submitted_evidence_type": "oe-evidence",
            "support": {"prover_type": "vse-verifier", "items": []}
        }"#;
        let request: TrustRequest = serde_json::from_str(json).unwrap();
        assert!(request.purpose.is_none());
        assert!(request.support.is_vse());
    }

    #[test]
    fn test_failed_response_has_no_artifact() {
        let request = TrustRequest::new("client", "server", "oe-evidence", EvidencePackage::vse());
        let response = TrustResponse::failed(&request);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json.get("artifact").is_none());
        assert!(response.artifact_bytes().is_none());
    }

    #[test]
    fn test_succeeded_response_carries_artifact() {
        let request = TrustRequest::new("client", "server", "sev-evidence", EvidencePackage::vse())
            .with_purpose("attestation");
        let response = TrustResponse::succeeded(&request, b"\xd2\x84cose");

        assert!(response.is_success());
        assert_eq!(response.providing_enclave_tag, "server");
        assert_eq!(response.artifact_bytes().unwrap().unwrap(), b"\xd2\x84cose");
    }
}
