//! Fact augmentation from administrator policy
//!
//! After normalization the evidence says who vouches for whom, but nothing
//! yet ties the chain to the policy key. The augmenter looks up the policy
//! statements that do: trust in the enclave's measurement and, depending on
//! the format, trust in the platform (or root) key. Each found statement is
//! re-verified and must be signed by the policy key before it is appended to
//! the proved statements.

use crate::clause::Clause;
use crate::crypto::StatementVerifier;
use crate::error::{CertifierError, Result};
use crate::evidence::{EvidenceFormat, SignedStatement};
use crate::normalize::{authenticate_statement, Normalized, NormalizedEvidence};
use crate::policy::PolicyIndex;
use crate::proof::ProvedStatements;
use crate::types::{KeyEntity, Measurement};
use tracing::{debug, warn};

/// Facts available to the proof synthesizer, named per pipeline
///
/// Policy facts are `policyKey says ...`; endorsements and bindings are the
/// authenticated evidence facts.
#[derive(Debug, Clone, PartialEq)]
pub enum AugmentedEvidence {
    PlatformChain {
        measurement_policy: Clause,
        platform_policy: Clause,
        attest_endorsement: Clause,
        binding: Clause,
    },
    PolicyEndorsed {
        measurement_policy: Clause,
        attest_endorsement: Clause,
        binding: Clause,
    },
    Sev {
        measurement_policy: Clause,
        ark_policy: Clause,
        ask_endorsement: Clause,
        vcek_endorsement: Clause,
        binding: Clause,
    },
    Oe {
        measurement_policy: Clause,
        platform_policy: Clause,
        binding: Clause,
    },
    Gramine {
        measurement_policy: Clause,
        /// Unwrapped `enclaveKey speaks-for measurement`
        speaks_for: Clause,
    },
}

/// Output of augmentation
#[derive(Debug, Clone)]
pub struct Augmented {
    pub format: EvidenceFormat,
    /// `policyKey is-trusted`
    pub root: Clause,
    /// Key bound by the terminal speaks-for fact
    pub enclave_key: KeyEntity,
    pub evidence: AugmentedEvidence,
    pub proved: ProvedStatements,
}

/// Fact augmenter over a policy index
pub struct FactAugmenter<'a> {
    index: &'a PolicyIndex,
    verifier: &'a dyn StatementVerifier,
    policy_key: &'a KeyEntity,
}

impl<'a> FactAugmenter<'a> {
    pub fn new(
        index: &'a PolicyIndex,
        verifier: &'a dyn StatementVerifier,
        policy_key: &'a KeyEntity,
    ) -> Self {
        Self {
            index,
            verifier,
            policy_key,
        }
    }

    /// Append the policy facts the format needs
    pub fn augment(&self, normalized: Normalized) -> Result<Augmented> {
        let Normalized {
            format,
            evidence,
            mut proved,
        } = normalized;

        let root = Clause::is_trusted(self.policy_key.clone());
        let binding = evidence.binding();
        let enclave_key = binding.enclave_key.clone();
        let measurement = binding.measurement.clone();

        let augmented = match evidence {
            NormalizedEvidence::PlatformChain { platform, binding } => {
                let platform_policy = self.platform_key_policy(&platform.issuer)?;
                let measurement_policy = self.measurement_policy(&measurement)?;
                proved.push(platform_policy.clone());
                proved.push(measurement_policy.clone());
                AugmentedEvidence::PlatformChain {
                    measurement_policy,
                    platform_policy,
                    attest_endorsement: platform.clause,
                    binding: binding.clause,
                }
            }
            NormalizedEvidence::PolicyEndorsed {
                endorsement,
                binding,
            } => {
                let measurement_policy = self.measurement_policy(&measurement)?;
                proved.push(measurement_policy.clone());
                AugmentedEvidence::PolicyEndorsed {
                    measurement_policy,
                    attest_endorsement: endorsement.clause,
                    binding: binding.clause,
                }
            }
            NormalizedEvidence::Sev {
                ark,
                ask,
                vcek,
                binding,
            } => {
                let ark_policy = self.platform_key_policy(&ark.subject)?;
                let measurement_policy = self.measurement_policy(&measurement)?;
                proved.push(ark_policy.clone());
                proved.push(measurement_policy.clone());
                AugmentedEvidence::Sev {
                    measurement_policy,
                    ark_policy,
                    ask_endorsement: ask.clause,
                    vcek_endorsement: vcek.clause,
                    binding: binding.clause,
                }
            }
            NormalizedEvidence::Oe { binding } => {
                let measurement_policy = self.measurement_policy(&measurement)?;
                let platform_policy = self.platform_key_policy(&binding.attester)?;
                proved.push(measurement_policy.clone());
                proved.push(platform_policy.clone());
                AugmentedEvidence::Oe {
                    measurement_policy,
                    platform_policy,
                    binding: binding.clause,
                }
            }
            NormalizedEvidence::Gramine { binding } => {
                let measurement_policy = self.measurement_policy(&measurement)?;
                proved.push(measurement_policy.clone());
                AugmentedEvidence::Gramine {
                    measurement_policy,
                    speaks_for: binding.speaks_for(),
                }
            }
        };

        debug!(format = %format, facts = proved.len(), "Augmented evidence with policy");

        Ok(Augmented {
            format,
            root,
            enclave_key,
            evidence: augmented,
            proved,
        })
    }

    fn measurement_policy(&self, measurement: &Measurement) -> Result<Clause> {
        let statement = self.index.find_measurement_policy(measurement).ok_or_else(|| {
            warn!(measurement = %measurement.to_hex(), "No measurement policy");
            CertifierError::PolicyNotFound(format!("no policy trusts {}", measurement))
        })?;
        self.policy_fact(statement)
    }

    fn platform_key_policy(&self, key: &KeyEntity) -> Result<Clause> {
        let statement = self.index.find_platform_key_policy(key).ok_or_else(|| {
            warn!(key = %key, "No platform key policy");
            CertifierError::PolicyNotFound(format!("no policy trusts {} for attestation", key))
        })?;
        self.policy_fact(statement)
    }

    /// Re-verify a policy statement and check it came from the policy key
    fn policy_fact(&self, statement: &SignedStatement) -> Result<Clause> {
        let clause = authenticate_statement(self.verifier, statement)
            .map_err(|e| CertifierError::UnverifiableSignature(format!("policy statement: {}", e)))?;
        if !statement.signing_key.same_key(self.policy_key) {
            return Err(CertifierError::UnverifiableSignature(format!(
                "policy statement signed by {}, not the policy key",
                statement.signing_key
            )));
        }
        Ok(clause)
    }
}
