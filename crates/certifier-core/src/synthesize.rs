//! Proof synthesis
//!
//! Builds the canonical proof for augmented evidence. Trust flows from the
//! root anchor through R3 (policy statements), R5 (chained attestation
//! keys) and R6 (the measurement binding), and one final R1 or R7 step
//! concludes the goal.

use crate::augment::{Augmented, AugmentedEvidence};
use crate::clause::Clause;
use crate::error::{CertifierError, Result};
use crate::proof::{Proof, RuleId};
use crate::types::Purpose;
use tracing::debug;

/// Goal plus the proof that concludes it
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedProof {
    pub goal: Clause,
    pub proof: Proof,
}

/// Rule of the final step for a purpose
pub fn final_rule(purpose: Purpose) -> RuleId {
    match purpose {
        Purpose::Authentication => RuleId::R1,
        Purpose::Attestation => RuleId::R7,
    }
}

/// Build the proof of `enclaveKey is-trusted-for-<purpose>`
pub fn synthesize_proof(augmented: &Augmented, purpose: Purpose) -> Result<SynthesizedProof> {
    let root = &augmented.root;
    let mut proof = Proof::new();

    let (measurement_trusted, speaks_for) = match &augmented.evidence {
        AugmentedEvidence::PlatformChain {
            measurement_policy,
            platform_policy,
            attest_endorsement,
            binding,
        } => {
            let measurement_trusted = proof.apply(RuleId::R3, root, measurement_policy)?;
            let platform_trusted = proof.apply(RuleId::R3, root, platform_policy)?;
            let attest_trusted = proof.apply(RuleId::R5, &platform_trusted, attest_endorsement)?;
            let speaks_for = proof.apply(RuleId::R6, &attest_trusted, binding)?;
            (measurement_trusted, speaks_for)
        }
        AugmentedEvidence::PolicyEndorsed {
            measurement_policy,
            attest_endorsement,
            binding,
        } => {
            let measurement_trusted = proof.apply(RuleId::R3, root, measurement_policy)?;
            let attest_trusted = proof.apply(RuleId::R3, root, attest_endorsement)?;
            let speaks_for = proof.apply(RuleId::R6, &attest_trusted, binding)?;
            (measurement_trusted, speaks_for)
        }
        AugmentedEvidence::Sev {
            measurement_policy,
            ark_policy,
            ask_endorsement,
            vcek_endorsement,
            binding,
        } => {
            let measurement_trusted = proof.apply(RuleId::R3, root, measurement_policy)?;
            let ark_trusted = proof.apply(RuleId::R3, root, ark_policy)?;
            let ask_trusted = proof.apply(RuleId::R5, &ark_trusted, ask_endorsement)?;
            let vcek_trusted = proof.apply(RuleId::R5, &ask_trusted, vcek_endorsement)?;
            let speaks_for = proof.apply(RuleId::R6, &vcek_trusted, binding)?;
            (measurement_trusted, speaks_for)
        }
        AugmentedEvidence::Oe {
            measurement_policy,
            platform_policy,
            binding,
        } => {
            let measurement_trusted = proof.apply(RuleId::R3, root, measurement_policy)?;
            let platform_trusted = proof.apply(RuleId::R3, root, platform_policy)?;
            let speaks_for = proof.apply(RuleId::R6, &platform_trusted, binding)?;
            (measurement_trusted, speaks_for)
        }
        AugmentedEvidence::Gramine {
            measurement_policy,
            speaks_for,
        } => {
            let measurement_trusted = proof.apply(RuleId::R3, root, measurement_policy)?;
            (measurement_trusted, speaks_for.clone())
        }
    };

    let goal = Clause::unary(augmented.enclave_key.clone(), purpose.goal_verb());
    let conclusion = proof.apply(final_rule(purpose), &measurement_trusted, &speaks_for)?;
    if conclusion != goal {
        return Err(CertifierError::ProofUnsound(format!(
            "proof concludes {} instead of {}",
            conclusion, goal
        )));
    }

    debug!(
        format = %augmented.format,
        %purpose,
        steps = proof.len(),
        goal = %goal,
        "Synthesized proof"
    );

    Ok(SynthesizedProof { goal, proof })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceFormat;
    use crate::proof::ProvedStatements;
    use crate::types::{KeyEntity, Measurement, Verb};

    fn key(byte: u8) -> KeyEntity {
        KeyEntity::new(None, vec![byte; 32])
    }

    fn gramine(purpose_measurement: Measurement, bound: Measurement) -> Augmented {
        let policy = key(1);
        let enclave = key(9);
        let root = Clause::is_trusted(policy.clone());
        let measurement_policy = Clause::says(policy, Clause::unary(purpose_measurement, Verb::IsTrusted));
        let speaks_for = Clause::speaks_for(enclave.clone(), bound);

        let mut proved = ProvedStatements::new(root.clone());
        proved.push(speaks_for.clone());
        proved.push(measurement_policy.clone());

        Augmented {
            format: EvidenceFormat::GramineEvidence,
            root,
            enclave_key: enclave,
            evidence: AugmentedEvidence::Gramine {
                measurement_policy,
                speaks_for,
            },
            proved,
        }
    }

    #[test]
    fn test_gramine_two_steps() {
        let m = Measurement::new(vec![4u8; 32]);
        let synthesized = synthesize_proof(&gramine(m.clone(), m), Purpose::Authentication).unwrap();

        assert_eq!(synthesized.proof.rules(), vec![RuleId::R3, RuleId::R1]);
        assert_eq!(
            synthesized.goal,
            Clause::unary(key(9), Verb::IsTrustedForAuthentication)
        );
    }

    #[test]
    fn test_attestation_purpose_ends_in_r7() {
        let m = Measurement::new(vec![4u8; 32]);
        let synthesized = synthesize_proof(&gramine(m.clone(), m), Purpose::Attestation).unwrap();

        assert_eq!(synthesized.proof.last().unwrap().rule, RuleId::R7);
        assert_eq!(synthesized.goal, Clause::trusted_for_attestation(key(9)));
    }

    #[test]
    fn test_mismatched_measurement_yields_no_proof() {
        let err = synthesize_proof(
            &gramine(Measurement::new(vec![4u8; 32]), Measurement::new(vec![5u8; 32])),
            Purpose::Authentication,
        )
        .unwrap_err();
        assert!(matches!(err, CertifierError::ProofUnsound(_)));
    }
}
