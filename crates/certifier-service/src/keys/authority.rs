//! Policy authority
//!
//! Holds the policy key pair and issues the artifacts granted after a
//! successful certification:
//! - admission credentials (authentication purpose)
//! - platform rules (attestation purpose)
//!
//! Serial numbers come from a single counter seeded with the start-up time
//! in nanoseconds. Every issuance takes the next value with one atomic
//! fetch-add, so concurrent requests never share a serial.

use certifier_core::{
    credential::{AdmissionCredential, PlatformRule, SignedCredential, SignedPlatformRule, Validity},
    CertifierError, Clause, KeyEntity, KeyPair, Purpose, SignedStatement,
};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Issuer of admission credentials and platform rules
pub struct PolicyAuthority {
    key_pair: KeyPair,
    credential_duration: Duration,
    next_serial: AtomicU64,
}

impl std::fmt::Debug for PolicyAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyAuthority")
            .field("kid", &self.key_pair.kid())
            .field("credential_duration", &self.credential_duration)
            .finish()
    }
}

impl PolicyAuthority {
    /// Create an authority with the serial counter seeded from the clock
    pub fn new(key_pair: KeyPair, credential_duration: Duration) -> Self {
        let seed = Utc::now()
            .timestamp_nanos_opt()
            .map(|nanos| nanos as u64)
            .unwrap_or_default();
        Self::with_serial_seed(key_pair, credential_duration, seed)
    }

    /// Create an authority with an explicit first serial number
    pub fn with_serial_seed(key_pair: KeyPair, credential_duration: Duration, seed: u64) -> Self {
        Self {
            key_pair,
            credential_duration,
            next_serial: AtomicU64::new(seed),
        }
    }

    /// Generate an authority with a fresh random policy key
    pub fn generate(kid: impl Into<String>, credential_duration: Duration) -> Self {
        Self::new(KeyPair::generate(kid), credential_duration)
    }

    /// Key ID of the policy key
    pub fn kid(&self) -> &str {
        self.key_pair.kid()
    }

    /// The policy key as a calculus entity
    pub fn policy_key(&self) -> KeyEntity {
        self.key_pair.entity()
    }

    pub fn credential_duration(&self) -> Duration {
        self.credential_duration
    }

    /// Take the next serial number
    pub fn next_serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::SeqCst)
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Sign an admission credential for a certified enclave key
    pub fn issue_admission_credential(
        &self,
        subject: &KeyEntity,
        label: &str,
        purpose: Purpose,
    ) -> Result<SignedCredential, CertifierError> {
        let credential = AdmissionCredential::builder()
            .serial_number(self.next_serial())
            .issuer(self.policy_key())
            .subject(subject.clone())
            .label(label)
            .purpose(purpose)
            .validity(Validity::starting_now(self.credential_duration))
            .build()?;

        let signed = self.key_pair.sign(&credential)?;
        info!(
            serial = credential.serial_number,
            subject = %subject,
            label = %credential.label,
            not_after = %credential.validity.not_after,
            "Issued admission credential"
        );
        Ok(signed)
    }

    /// Sign a platform rule trusting an enclave key for attestation
    pub fn issue_platform_rule(&self, subject: &KeyEntity) -> Result<SignedPlatformRule, CertifierError> {
        let rule = PlatformRule::new(
            self.next_serial(),
            self.policy_key(),
            subject.clone(),
            Validity::starting_now(self.credential_duration),
        );

        let signed = self.key_pair.sign(&rule)?;
        info!(
            serial = rule.serial_number,
            subject = %subject,
            not_after = %rule.validity.not_after,
            "Issued platform rule"
        );
        Ok(signed)
    }

    /// Sign a policy statement `policyKey says quoted`
    pub fn sign_policy(&self, quoted: Clause) -> Result<SignedStatement, CertifierError> {
        self.key_pair
            .sign_statement(&Clause::says(self.policy_key(), quoted))
    }
}
