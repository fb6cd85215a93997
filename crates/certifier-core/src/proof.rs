//! Proofs in the trust calculus
//!
//! A proof is a list of rule applications. Each step names two premises, the
//! conclusion, and the rule that links them; [`RuleId::derive`] is the single
//! definition of what each rule concludes, used both when building proofs and
//! when replaying them.

use crate::clause::Clause;
use crate::error::{CertifierError, Result};
use crate::types::{KeyEntity, Verb};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inference rules used by the certifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleId {
    /// `M is-trusted` + `X speaks-for M` => `X is-trusted-for-authentication`
    R1,
    /// `K is-trusted` + `K says P` => `P`
    R3,
    /// `K is-trusted-for-attestation` + `K says K2 is-trusted-for-attestation`
    /// => `K2 is-trusted-for-attestation`
    R5,
    /// `K is-trusted-for-attestation` + `K says X speaks-for M` => `X speaks-for M`
    R6,
    /// `M is-trusted` + `X speaks-for M` => `X is-trusted-for-attestation`
    R7,
}

impl RuleId {
    /// Conclusion of applying this rule to the premises, if it applies
    pub fn derive(&self, premise1: &Clause, premise2: &Clause) -> Option<Clause> {
        match self {
            RuleId::R3 => {
                if !premise1.is_unary(Verb::IsTrusted) {
                    return None;
                }
                let trusted = premise1.subject_key()?;
                let (speaker, quoted) = premise2.as_says()?;
                speaker.same_key(trusted).then(|| quoted.clone())
            }
            RuleId::R5 => {
                let (_, quoted) = Self::attested_says(premise1, premise2)?;
                if quoted.is_unary(Verb::IsTrustedForAttestation) && quoted.subject_key().is_some() {
                    Some(quoted.clone())
                } else {
                    None
                }
            }
            RuleId::R6 => {
                let (_, quoted) = Self::attested_says(premise1, premise2)?;
                let is_binding = quoted.verb == Verb::SpeaksFor
                    && quoted.clause.is_none()
                    && quoted.object_measurement().is_some();
                is_binding.then(|| quoted.clone())
            }
            RuleId::R1 => Self::measured(premise1, premise2, Verb::IsTrustedForAuthentication),
            RuleId::R7 => Self::measured(premise1, premise2, Verb::IsTrustedForAttestation),
        }
    }

    /// `K is-trusted-for-attestation` + `K says P`
    fn attested_says<'a>(
        premise1: &Clause,
        premise2: &'a Clause,
    ) -> Option<(&'a KeyEntity, &'a Clause)> {
        if !premise1.is_unary(Verb::IsTrustedForAttestation) {
            return None;
        }
        let attester = premise1.subject_key()?;
        let (speaker, quoted) = premise2.as_says()?;
        speaker.same_key(attester).then_some((speaker, quoted))
    }

    /// `M is-trusted` + `X speaks-for M` => `X verb`
    fn measured(premise1: &Clause, premise2: &Clause, verb: Verb) -> Option<Clause> {
        if !premise1.is_unary(Verb::IsTrusted) {
            return None;
        }
        let measurement = premise1.subject.as_measurement()?;
        if premise2.verb != Verb::SpeaksFor || premise2.clause.is_some() {
            return None;
        }
        if premise2.object_measurement()? != measurement {
            return None;
        }
        Some(Clause::unary(premise2.subject.clone(), verb))
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One rule application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub premise1: Clause,
    pub premise2: Clause,
    pub conclusion: Clause,
    pub rule: RuleId,
}

impl ProofStep {
    /// Apply `rule` to the premises, failing if it does not apply
    pub fn apply(rule: RuleId, premise1: &Clause, premise2: &Clause) -> Result<Self> {
        let conclusion = rule.derive(premise1, premise2).ok_or_else(|| {
            CertifierError::ProofUnsound(format!(
                "rule {} does not apply to ({}) and ({})",
                rule, premise1, premise2
            ))
        })?;
        Ok(Self {
            premise1: premise1.clone(),
            premise2: premise2.clone(),
            conclusion,
            rule,
        })
    }

    /// True if the declared rule yields exactly the declared conclusion
    pub fn is_justified(&self) -> bool {
        self.rule
            .derive(&self.premise1, &self.premise2)
            .is_some_and(|derived| derived == self.conclusion)
    }
}

/// Ordered proof, read top to bottom
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof {
    steps: Vec<ProofStep>,
}

impl Proof {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a rule and append the step, returning its conclusion
    pub fn apply(&mut self, rule: RuleId, premise1: &Clause, premise2: &Clause) -> Result<Clause> {
        let step = ProofStep::apply(rule, premise1, premise2)?;
        let conclusion = step.conclusion.clone();
        self.steps.push(step);
        Ok(conclusion)
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&ProofStep> {
        self.steps.last()
    }

    /// Declared rules in step order
    pub fn rules(&self) -> Vec<RuleId> {
        self.steps.iter().map(|step| step.rule).collect()
    }
}

impl From<Vec<ProofStep>> for Proof {
    fn from(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }
}

/// Facts established during one evaluation
///
/// Append-only. Index 0 is the root anchor the sequence was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvedStatements {
    facts: Vec<Clause>,
}

impl ProvedStatements {
    /// Start a sequence from its root anchor
    pub fn new(root: Clause) -> Self {
        Self { facts: vec![root] }
    }

    /// Append a fact, returning its index
    pub fn push(&mut self, fact: Clause) -> usize {
        self.facts.push(fact);
        self.facts.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Clause> {
        self.facts.get(index)
    }

    /// The anchor at index 0
    pub fn root(&self) -> Option<&Clause> {
        self.facts.first()
    }

    pub fn contains(&self, fact: &Clause) -> bool {
        self.facts.contains(fact)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Clause> {
        self.facts.iter()
    }

    pub fn as_slice(&self) -> &[Clause] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProvedStatements {
    type Item = &'a Clause;
    type IntoIter = std::slice::Iter<'a, Clause>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}
