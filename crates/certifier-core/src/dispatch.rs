//! Evidence dispatch
//!
//! [`Certifier`] is the entry point of the core: it holds the trusted policy
//! key and the policy index, and runs normalization, augmentation and proof
//! synthesis in that order for one evidence package. It keeps no state
//! between calls and can be shared across tasks behind an `Arc`.

use crate::augment::FactAugmenter;
use crate::clause::Clause;
use crate::crypto::{CoseVerifier, StatementVerifier};
use crate::error::Result;
use crate::evidence::{EvidenceFormat, EvidencePackage};
use crate::normalize::EvidenceNormalizer;
use crate::policy::PolicyIndex;
use crate::proof::{Proof, ProvedStatements};
use crate::synthesize::synthesize_proof;
use crate::types::{KeyEntity, Measurement, Purpose, Verb};
use crate::verify::verify_proof;
use tracing::warn;

/// A goal with its proof and the facts the proof starts from
#[derive(Debug, Clone)]
pub struct Certification {
    pub format: EvidenceFormat,
    pub purpose: Purpose,
    pub goal: Clause,
    pub proof: Proof,
    pub proved: ProvedStatements,
}

impl Certification {
    /// The key the goal is about
    pub fn subject_key(&self) -> Option<&KeyEntity> {
        self.goal.subject_key()
    }

    /// Measurement the subject key speaks for, if proved
    pub fn measurement(&self) -> Option<&Measurement> {
        let subject = self.subject_key()?;
        self.proved
            .iter()
            .chain(self.proof.steps().iter().map(|step| &step.conclusion))
            .find(|fact| {
                fact.verb == Verb::SpeaksFor
                    && fact.subject_key().is_some_and(|k| k.same_key(subject))
            })
            .and_then(Clause::object_measurement)
    }
}

/// Certifier bound to one policy key and policy index
pub struct Certifier<V: StatementVerifier = CoseVerifier> {
    policy_key: KeyEntity,
    index: PolicyIndex,
    verifier: V,
}

impl Certifier<CoseVerifier> {
    pub fn new(policy_key: KeyEntity, index: PolicyIndex) -> Self {
        Self::with_verifier(policy_key, index, CoseVerifier)
    }
}

impl<V: StatementVerifier> Certifier<V> {
    /// Use a custom signature verifier
    pub fn with_verifier(policy_key: KeyEntity, index: PolicyIndex, verifier: V) -> Self {
        Self {
            policy_key,
            index,
            verifier,
        }
    }

    pub fn policy_key(&self) -> &KeyEntity {
        &self.policy_key
    }

    pub fn index(&self) -> &PolicyIndex {
        &self.index
    }

    /// Build the proof that the evidence's enclave key is trusted
    ///
    /// `tag` is checked before anything else; an unknown tag fails without
    /// touching the evidence or the policy index.
    pub fn construct_proof(
        &self,
        tag: &str,
        package: &EvidencePackage,
        purpose: Option<&str>,
    ) -> Result<Certification> {
        let format: EvidenceFormat = tag.parse().map_err(|e| {
            warn!(tag, error = %e, "Rejected evidence type");
            e
        })?;
        let purpose = Purpose::from_request(purpose);

        let normalized = EvidenceNormalizer::new(&self.verifier, &self.policy_key)
            .normalize(format, package)?;
        let augmented =
            FactAugmenter::new(&self.index, &self.verifier, &self.policy_key).augment(normalized)?;
        let synthesized = synthesize_proof(&augmented, purpose)?;

        Ok(Certification {
            format,
            purpose,
            goal: synthesized.goal,
            proof: synthesized.proof,
            proved: augmented.proved,
        })
    }

    /// Replay a certification against this certifier's policy key
    pub fn verify(&self, certification: &Certification) -> Result<()> {
        verify_proof(
            &self.policy_key,
            &certification.goal,
            &certification.proof,
            &certification.proved,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::error::CertifierError;
    use crate::evidence::{AttestationReport, EvidenceItem, ReportPlatform, SignedReport, SignedStatement};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Verifier that counts calls, to prove early rejection
    #[derive(Default)]
    struct CountingVerifier {
        calls: AtomicUsize,
    }

    impl StatementVerifier for CountingVerifier {
        fn verify_signed_statement(&self, s: &SignedStatement, k: &KeyEntity) -> Result<Clause> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CoseVerifier.verify_signed_statement(s, k)
        }

        fn verify_report(&self, r: &SignedReport, k: &KeyEntity) -> Result<AttestationReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CoseVerifier.verify_report(r, k)
        }
    }

    #[test]
    fn test_unknown_tag_rejected_before_verification() {
        let admin = KeyPair::generate("policy-key");
        let enclave = KeyPair::generate("enclave");
        let report = AttestationReport::new(ReportPlatform::Oe, enclave.entity(), Measurement::new(vec![1u8; 32]));
        let package = EvidencePackage::vse()
            .with_item(EvidenceItem::AttestationReport(admin.sign_report(&report).unwrap()));

        let certifier = Certifier::with_verifier(
            admin.entity(),
            PolicyIndex::default(),
            CountingVerifier::default(),
        );
        let err = certifier.construct_proof("bogus-format", &package, None).unwrap_err();

        assert!(matches!(err, CertifierError::UnknownEvidenceType(_)));
        assert_eq!(certifier.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_certification_measurement_lookup() {
        let admin = KeyPair::generate("policy-key");
        let platform = KeyPair::generate("oe-platform");
        let enclave = KeyPair::generate("enclave");
        let m = Measurement::new(vec![8u8; 32]);

        let index = PolicyIndex::build(vec![
            admin
                .sign_statement(&Clause::says(admin.entity(), Clause::unary(m.clone(), Verb::IsTrusted)))
                .unwrap(),
            admin
                .sign_statement(&Clause::says(
                    admin.entity(),
                    Clause::trusted_for_attestation(platform.entity()),
                ))
                .unwrap(),
        ]);
        let report = AttestationReport::new(ReportPlatform::Oe, enclave.entity(), m.clone());
        let package = EvidencePackage::vse()
            .with_item(EvidenceItem::AttestationReport(platform.sign_report(&report).unwrap()));

        let certifier = Certifier::new(admin.entity(), index);
        let certification = certifier.construct_proof("oe-evidence", &package, None).unwrap();

        assert_eq!(certification.proof.len(), 4);
        assert_eq!(certification.measurement(), Some(&m));
        assert!(certification.subject_key().unwrap().same_key(&enclave.entity()));
        assert!(certifier.verify(&certification).is_ok());
    }
}
