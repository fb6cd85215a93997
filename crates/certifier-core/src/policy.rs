//! Administrator policy index
//!
//! The policy file is an ordered list of statements signed by the policy
//! key. At start-up each statement is sorted into one of three buckets by
//! the shape of the clause it quotes:
//!
//! | Bucket | Quoted clause |
//! |---|---|
//! | platform key | `key is-trusted-for-attestation` |
//! | measurement | `measurement is-trusted` |
//! | platform feature | `platform has-trusted-platform-property` |
//!
//! Signatures are not checked here. A statement found by a lookup is
//! verified when it is turned into a fact.

use crate::clause::Clause;
use crate::evidence::SignedStatement;
use crate::types::{Entity, KeyEntity, Measurement, PlatformDescriptor, Verb};
use tracing::{debug, warn};

/// Bucket a policy statement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyCategory {
    PlatformKey,
    Measurement,
    PlatformFeature,
}

impl PolicyCategory {
    /// Classify a statement by the clause it quotes
    pub fn classify(clause: &Clause) -> Option<Self> {
        let quoted = clause.quoted()?;
        match (&quoted.subject, quoted.verb) {
            (Entity::Key(_), Verb::IsTrustedForAttestation) if quoted.object.is_none() => {
                Some(PolicyCategory::PlatformKey)
            }
            (Entity::Measurement(_), Verb::IsTrusted) if quoted.object.is_none() => {
                Some(PolicyCategory::Measurement)
            }
            (Entity::Platform(_), Verb::HasTrustedPlatformProperty) => {
                Some(PolicyCategory::PlatformFeature)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedPolicy {
    statement: SignedStatement,
    /// Subject of the quoted clause
    subject: Entity,
}

/// Read-only index over the loaded policy statements
#[derive(Debug, Clone, Default)]
pub struct PolicyIndex {
    all: Vec<SignedStatement>,
    platform_keys: Vec<IndexedPolicy>,
    measurements: Vec<IndexedPolicy>,
    features: Vec<IndexedPolicy>,
}

impl PolicyIndex {
    /// Build the index, keeping file order within each bucket
    pub fn build(statements: Vec<SignedStatement>) -> Self {
        let mut index = PolicyIndex::default();

        for (position, statement) in statements.into_iter().enumerate() {
            let clause = match statement.extract_clause() {
                Ok(clause) => clause,
                Err(e) => {
                    warn!(position, error = %e, "Policy statement does not decode, not indexed");
                    index.all.push(statement);
                    continue;
                }
            };

            let category = PolicyCategory::classify(&clause);
            let subject = clause.quoted().map(|quoted| quoted.subject.clone());

            match (category, subject) {
                (Some(category), Some(subject)) => {
                    debug!(position, ?category, clause = %clause, "Indexed policy statement");
                    let entry = IndexedPolicy {
                        statement: statement.clone(),
                        subject,
                    };
                    match category {
                        PolicyCategory::PlatformKey => index.platform_keys.push(entry),
                        PolicyCategory::Measurement => index.measurements.push(entry),
                        PolicyCategory::PlatformFeature => index.features.push(entry),
                    }
                }
                _ => {
                    warn!(position, clause = %clause, "Unclassifiable policy statement, not indexed");
                }
            }
            index.all.push(statement);
        }

        index
    }

    /// Policy trusting the measurement, matched by exact digest bytes
    pub fn find_measurement_policy(&self, measurement: &Measurement) -> Option<&SignedStatement> {
        self.measurements
            .iter()
            .find(|entry| entry.subject.as_measurement() == Some(measurement))
            .map(|entry| &entry.statement)
    }

    /// Policy trusting the key for attestation, matched by key material
    pub fn find_platform_key_policy(&self, key: &KeyEntity) -> Option<&SignedStatement> {
        self.platform_keys
            .iter()
            .find(|entry| entry.subject.as_key().is_some_and(|k| k.same_key(key)))
            .map(|entry| &entry.statement)
    }

    /// Policy trusting the platform's properties, matched by descriptor
    pub fn find_feature_policy(&self, descriptor: &PlatformDescriptor) -> Option<&SignedStatement> {
        self.features
            .iter()
            .find(|entry| entry.subject.as_platform() == Some(descriptor))
            .map(|entry| &entry.statement)
    }

    /// Every loaded statement in file order, classified or not
    pub fn statements(&self) -> &[SignedStatement] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn platform_key_count(&self) -> usize {
        self.platform_keys.len()
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}
