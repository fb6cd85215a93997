//! Proof replay
//!
//! Checks a proof against the facts it claims to start from, independently
//! of how the proof was built. Credentials are only issued after replay
//! accepts.

use crate::clause::Clause;
use crate::error::{CertifierError, Result};
use crate::proof::{Proof, ProvedStatements};
use crate::types::{KeyEntity, Verb};
use tracing::error;

/// Replay `proof` from `proved` and confirm it concludes `goal`
///
/// - index 0 of `proved` must be `policy_key is-trusted`
/// - each step's premises must be proved facts or earlier conclusions
/// - each step's rule must derive exactly its declared conclusion
/// - `goal` must be among the conclusions
pub fn verify_proof(
    policy_key: &KeyEntity,
    goal: &Clause,
    proof: &Proof,
    proved: &ProvedStatements,
) -> Result<()> {
    let anchored = proved.root().is_some_and(|root| {
        root.is_unary(Verb::IsTrusted) && root.subject_key().is_some_and(|k| k.same_key(policy_key))
    });
    if !anchored {
        return Err(unsound("proved statements are not anchored at the policy key".into()));
    }

    let mut known: Vec<&Clause> = proved.iter().collect();

    for (position, step) in proof.steps().iter().enumerate() {
        for premise in [&step.premise1, &step.premise2] {
            if !known.contains(&premise) {
                return Err(unsound(format!(
                    "step {} uses unproved premise {}",
                    position, premise
                )));
            }
        }
        if !step.is_justified() {
            return Err(unsound(format!(
                "step {} does not follow by {}: {}",
                position, step.rule, step.conclusion
            )));
        }
        known.push(&step.conclusion);
    }

    if !proof.steps().iter().any(|step| &step.conclusion == goal) {
        return Err(unsound(format!("proof does not conclude {}", goal)));
    }

    Ok(())
}

fn unsound(reason: String) -> CertifierError {
    error!(%reason, "Proof rejected on replay");
    CertifierError::ProofUnsound(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{ProofStep, RuleId};
    use crate::types::Measurement;

    fn key(byte: u8) -> KeyEntity {
        KeyEntity::new(None, vec![byte; 32])
    }

    struct Fixture {
        policy: KeyEntity,
        goal: Clause,
        proof: Proof,
        proved: ProvedStatements,
    }

    fn fixture() -> Fixture {
        let policy = key(1);
        let enclave = key(9);
        let m = Measurement::new(vec![4u8; 32]);
        let root = Clause::is_trusted(policy.clone());
        let measurement_policy = Clause::says(policy.clone(), Clause::unary(m.clone(), Verb::IsTrusted));
        let speaks_for = Clause::speaks_for(enclave.clone(), m);

        let mut proved = ProvedStatements::new(root.clone());
        proved.push(speaks_for.clone());
        proved.push(measurement_policy.clone());

        let mut proof = Proof::new();
        let trusted = proof.apply(RuleId::R3, &root, &measurement_policy).unwrap();
        let goal = proof.apply(RuleId::R1, &trusted, &speaks_for).unwrap();

        Fixture {
            policy,
            goal,
            proof,
            proved,
        }
    }

    #[test]
    fn test_valid_proof_replays() {
        let f = fixture();
        assert!(verify_proof(&f.policy, &f.goal, &f.proof, &f.proved).is_ok());
    }

    #[test]
    fn test_wrong_anchor_rejected() {
        let f = fixture();
        let err = verify_proof(&key(2), &f.goal, &f.proof, &f.proved).unwrap_err();
        assert!(matches!(err, CertifierError::ProofUnsound(_)));
    }

    #[test]
    fn test_unproved_premise_rejected() {
        let f = fixture();
        let mut proved = ProvedStatements::new(Clause::is_trusted(f.policy.clone()));
        // binding missing
        proved.push(f.proved.get(2).unwrap().clone());
        assert!(verify_proof(&f.policy, &f.goal, &f.proof, &proved).is_err());
    }

    #[test]
    fn test_mislabelled_rule_rejected() {
        let f = fixture();
        let mut steps = f.proof.steps().to_vec();
        steps[1].rule = RuleId::R7;
        let proof = Proof::from(steps);
        assert!(verify_proof(&f.policy, &f.goal, &proof, &f.proved).is_err());
    }

    #[test]
    fn test_goal_must_be_concluded() {
        let f = fixture();
        let other_goal = Clause::trusted_for_attestation(key(9));
        assert!(verify_proof(&f.policy, &other_goal, &f.proof, &f.proved).is_err());
    }

    #[test]
    fn test_forward_reference_rejected() {
        let f = fixture();
        let mut steps: Vec<ProofStep> = f.proof.steps().to_vec();
        steps.reverse();
        assert!(verify_proof(&f.policy, &f.goal, &Proof::from(steps), &f.proved).is_err());
    }
}
