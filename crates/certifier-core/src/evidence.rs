//! Evidence packages submitted by enclaves
//!
//! An evidence package is an ordered list of signed items plus the prover
//! type that should interpret them. The certifier only understands packages
//! for the VSE verifier; the evidence type tag sent alongside the package
//! selects how the items are read (see [`EvidenceFormat`]).

use crate::clause::Clause;
use crate::crypto::{CoseSigned, SignedPayload};
use crate::error::{CertifierError, Result};
use crate::types::{serde_bytes_base64, KeyEntity, Measurement, PlatformDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only prover type the certifier accepts
pub const VSE_VERIFIER: &str = "vse-verifier";

/// Prover type plus ordered evidence items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePackage {
    pub prover_type: String,

    #[serde(default)]
    pub items: Vec<EvidenceItem>,
}

impl EvidencePackage {
    /// Empty package for the VSE verifier
    pub fn vse() -> Self {
        Self {
            prover_type: VSE_VERIFIER.to_string(),
            items: Vec::new(),
        }
    }

    /// Append an item (builder pattern)
    pub fn with_item(mut self, item: EvidenceItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn is_vse(&self) -> bool {
        self.prover_type == VSE_VERIFIER
    }
}

/// One typed item of an evidence package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "evidence_type", rename_all = "kebab-case")]
pub enum EvidenceItem {
    /// Any signed `key says ...` statement
    SignedClaim(SignedStatement),
    /// Endorsement `issuer says subject is-trusted-for-attestation`
    Cert(SignedStatement),
    /// Platform attestation report signed by the attesting key
    AttestationReport(SignedReport),
    /// Endorsements ordered root first
    CertChain { certs: Vec<SignedStatement> },
}

impl EvidenceItem {
    pub fn kind(&self) -> &'static str {
        match self {
            EvidenceItem::SignedClaim(_) => "signed-claim",
            EvidenceItem::Cert(_) => "cert",
            EvidenceItem::AttestationReport(_) => "attestation-report",
            EvidenceItem::CertChain { .. } => "cert-chain",
        }
    }
}

/// A clause signed by an authority, with the signer's key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedStatement {
    /// Key claimed to have produced the signature
    pub signing_key: KeyEntity,

    /// COSE_Sign1 envelope over the JSON clause
    pub statement: CoseSigned<Clause>,
}

impl SignedStatement {
    /// Decode the clause without verifying the signature
    pub fn extract_clause(&self) -> Result<Clause> {
        self.statement.extract()
    }
}

/// An attestation report signed by the attesting key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedReport {
    pub signing_key: KeyEntity,
    pub report: CoseSigned<AttestationReport>,
}

/// Platform that produced an attestation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPlatform {
    /// Simulated or software-attested VSE enclave
    Vse,
    /// AMD SEV-SNP
    Sev,
    /// Open Enclave (SGX)
    Oe,
    /// Gramine (SGX)
    Gramine,
}

impl ReportPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPlatform::Vse => "vse",
            ReportPlatform::Sev => "sev",
            ReportPlatform::Oe => "oe",
            ReportPlatform::Gramine => "gramine",
        }
    }
}

impl fmt::Display for ReportPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded attestation report
///
/// A report signed by `attester` stands for the clause
/// `attester says enclave_key speaks-for measurement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationReport {
    pub platform: ReportPlatform,

    /// Key generated inside the enclave
    pub enclave_key: KeyEntity,

    /// Measurement of the code running in the enclave
    pub measurement: Measurement,

    /// Platform properties observed by the attester
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_descriptor: Option<PlatformDescriptor>,

    /// Caller-chosen data bound into the report
    #[serde(default, with = "serde_bytes_base64")]
    pub report_data: Vec<u8>,
}

impl AttestationReport {
    pub fn new(platform: ReportPlatform, enclave_key: KeyEntity, measurement: Measurement) -> Self {
        Self {
            platform,
            enclave_key,
            measurement,
            platform_descriptor: None,
            report_data: Vec::new(),
        }
    }

    /// Attach observed platform properties
    pub fn with_platform_descriptor(mut self, descriptor: PlatformDescriptor) -> Self {
        self.platform_descriptor = Some(descriptor);
        self
    }

    /// Attach report data
    pub fn with_report_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.report_data = data.into();
        self
    }

    /// The clause this report asserts when signed by `attester`
    pub fn binding_clause(&self, attester: &KeyEntity) -> Clause {
        Clause::says(
            attester.clone(),
            Clause::speaks_for(self.enclave_key.clone(), self.measurement.clone()),
        )
    }
}

impl SignedPayload for AttestationReport {
    fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CertifierError::from)
    }

    fn from_payload(bytes: &[u8]) -> Result<Self> {
        let report: AttestationReport = serde_json::from_slice(bytes)?;
        if report.measurement.is_empty() {
            return Err(CertifierError::malformed("attestation report has empty measurement"));
        }
        Ok(report)
    }
}

/// Evidence type tags understood by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvidenceFormat {
    FullVseSupport,
    PlatformAttestationOnly,
    AugmentedPlatformAttestationOnly,
    SevEvidence,
    SevPlatformAttestationOnly,
    OeEvidence,
    GramineEvidence,
}

impl EvidenceFormat {
    pub const ALL: [EvidenceFormat; 7] = [
        EvidenceFormat::FullVseSupport,
        EvidenceFormat::PlatformAttestationOnly,
        EvidenceFormat::AugmentedPlatformAttestationOnly,
        EvidenceFormat::SevEvidence,
        EvidenceFormat::SevPlatformAttestationOnly,
        EvidenceFormat::OeEvidence,
        EvidenceFormat::GramineEvidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceFormat::FullVseSupport => "full-vse-support",
            EvidenceFormat::PlatformAttestationOnly => "platform-attestation-only",
            EvidenceFormat::AugmentedPlatformAttestationOnly => {
                "augmented-platform-attestation-only"
            }
            EvidenceFormat::SevEvidence => "sev-evidence",
            EvidenceFormat::SevPlatformAttestationOnly => "sev-platform-attestation-only",
            EvidenceFormat::OeEvidence => "oe-evidence",
            EvidenceFormat::GramineEvidence => "gramine-evidence",
        }
    }

    /// Platform a binding report must come from under this format
    pub fn report_platform(&self) -> ReportPlatform {
        match self {
            EvidenceFormat::FullVseSupport
            | EvidenceFormat::PlatformAttestationOnly
            | EvidenceFormat::AugmentedPlatformAttestationOnly => ReportPlatform::Vse,
            EvidenceFormat::SevEvidence | EvidenceFormat::SevPlatformAttestationOnly => {
                ReportPlatform::Sev
            }
            EvidenceFormat::OeEvidence => ReportPlatform::Oe,
            EvidenceFormat::GramineEvidence => ReportPlatform::Gramine,
        }
    }
}

impl FromStr for EvidenceFormat {
    type Err = CertifierError;

    fn from_str(tag: &str) -> Result<Self> {
        EvidenceFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == tag)
            .ok_or_else(|| CertifierError::UnknownEvidenceType(tag.to_string()))
    }
}

impl fmt::Display for EvidenceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
