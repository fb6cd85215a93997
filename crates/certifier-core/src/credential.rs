//! Artifacts issued after a successful certification
//!
//! - [`AdmissionCredential`]: for authentication, names the enclave key and
//!   the measurement it runs, signed by the policy key
//! - [`PlatformRule`]: for attestation, the statement
//!   `policyKey says enclaveKey is-trusted-for-attestation`
//!
//! Both carry a serial number and a validity window and travel as COSE_Sign1
//! envelopes.

use crate::clause::Clause;
use crate::crypto::{CoseSigned, SignedPayload};
use crate::error::{CertifierError, Result};
use crate::types::{KeyEntity, Measurement, Purpose, Verb};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Organization named in every admission credential
pub const CERTIFIER_ORGANIZATION: &str = "CertifierUsers";

/// Default credential lifetime
pub fn default_credential_duration() -> Duration {
    Duration::days(365)
}

/// Signed admission credential
pub type SignedCredential = CoseSigned<AdmissionCredential>;

/// Signed platform rule
pub type SignedPlatformRule = CoseSigned<PlatformRule>;

/// Validity window of an issued artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// Window starting at `now` and lasting `duration`
    pub fn starting_at(now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            not_before: now,
            not_after: now + duration,
        }
    }

    /// Window starting now
    pub fn starting_now(duration: Duration) -> Self {
        Self::starting_at(Utc::now(), duration)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    pub fn is_current(&self) -> bool {
        self.contains(Utc::now())
    }
}

/// Label identifying an admitted enclave
///
/// `Measured-<hex>` when its measurement is known, otherwise the key name.
pub fn subject_label(subject: &KeyEntity, measurement: Option<&Measurement>) -> String {
    match measurement {
        Some(m) => format!("Measured-{}", m.to_hex()),
        None => subject.display_name().to_string(),
    }
}

/// Credential admitting an enclave key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionCredential {
    pub serial_number: u64,
    pub issuer: KeyEntity,
    pub subject: KeyEntity,
    pub organization: String,
    pub label: String,
    pub purpose: Purpose,
    pub validity: Validity,
}

impl AdmissionCredential {
    pub fn builder() -> AdmissionCredentialBuilder {
        AdmissionCredentialBuilder::default()
    }
}

impl SignedPayload for AdmissionCredential {
    fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CertifierError::from)
    }

    fn from_payload(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(CertifierError::from)
    }
}

/// Builder for admission credentials
#[derive(Debug, Default)]
pub struct AdmissionCredentialBuilder {
    serial_number: Option<u64>,
    issuer: Option<KeyEntity>,
    subject: Option<KeyEntity>,
    label: Option<String>,
    purpose: Purpose,
    validity: Option<Validity>,
}

impl AdmissionCredentialBuilder {
    pub fn serial_number(mut self, serial: u64) -> Self {
        self.serial_number = Some(serial);
        self
    }

    pub fn issuer(mut self, issuer: KeyEntity) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn subject(mut self, subject: KeyEntity) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the label (defaults to the subject key name)
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Build the credential
    ///
    /// Returns an error if serial number, issuer or subject is missing.
    pub fn build(self) -> Result<AdmissionCredential> {
        let serial_number = self
            .serial_number
            .ok_or(CertifierError::MissingField("serial_number".into()))?;
        let issuer = self.issuer.ok_or(CertifierError::MissingField("issuer".into()))?;
        let subject = self.subject.ok_or(CertifierError::MissingField("subject".into()))?;
        let label = self
            .label
            .unwrap_or_else(|| subject.display_name().to_string());

        Ok(AdmissionCredential {
            serial_number,
            issuer,
            subject,
            organization: CERTIFIER_ORGANIZATION.to_string(),
            label,
            purpose: self.purpose,
            validity: self
                .validity
                .unwrap_or_else(|| Validity::starting_now(default_credential_duration())),
        })
    }
}

/// Rule letting an enclave key vouch for other enclaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRule {
    pub serial_number: u64,
    /// `policyKey says enclaveKey is-trusted-for-attestation`
    pub statement: Clause,
    pub validity: Validity,
}

impl PlatformRule {
    pub fn new(serial_number: u64, policy_key: KeyEntity, enclave_key: KeyEntity, validity: Validity) -> Self {
        Self {
            serial_number,
            statement: Clause::says(policy_key, Clause::trusted_for_attestation(enclave_key)),
            validity,
        }
    }

    /// The key this rule trusts for attestation
    pub fn trusted_key(&self) -> Option<&KeyEntity> {
        self.statement.quoted().and_then(Clause::subject_key)
    }
}

impl SignedPayload for PlatformRule {
    fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CertifierError::from)
    }

    fn from_payload(bytes: &[u8]) -> Result<Self> {
        let rule: PlatformRule = serde_json::from_slice(bytes)?;
        rule.statement.validate()?;
        let trusts_key = rule
            .statement
            .quoted()
            .is_some_and(|q| q.is_unary(Verb::IsTrustedForAttestation) && q.subject_key().is_some());
        if !trusts_key {
            return Err(CertifierError::malformed(format!(
                "platform rule does not grant attestation trust: {}",
                rule.statement
            )));
        }
        Ok(rule)
    }
}
