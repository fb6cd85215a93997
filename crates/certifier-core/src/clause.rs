//! VSE clauses: Subject-Verb-Object statements of the trust calculus
//!
//! A clause is one of three shapes:
//! - unary: `subject verb` (e.g. `policyKey is-trusted`)
//! - simple: `subject verb object` (e.g. `enclaveKey speaks-for measurement`)
//! - indirect: `key says clause`, quoting another clause

use crate::error::{CertifierError, Result};
use crate::types::{Entity, KeyEntity, Measurement, Verb};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A statement in the trust calculus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub subject: Entity,

    pub verb: Verb,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Entity>,

    /// Quoted statement, present only when verb is `says`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<Box<Clause>>,
}

impl Clause {
    /// `subject verb`
    pub fn unary(subject: impl Into<Entity>, verb: Verb) -> Self {
        Self {
            subject: subject.into(),
            verb,
            object: None,
            clause: None,
        }
    }

    /// `subject verb object`
    pub fn simple(subject: impl Into<Entity>, verb: Verb, object: impl Into<Entity>) -> Self {
        Self {
            subject: subject.into(),
            verb,
            object: Some(object.into()),
            clause: None,
        }
    }

    /// `key says clause`
    pub fn says(speaker: KeyEntity, quoted: Clause) -> Self {
        Self {
            subject: Entity::Key(speaker),
            verb: Verb::Says,
            object: None,
            clause: Some(Box::new(quoted)),
        }
    }

    /// `key is-trusted`, the root anchor
    pub fn is_trusted(key: KeyEntity) -> Self {
        Self::unary(key, Verb::IsTrusted)
    }

    /// `key is-trusted-for-attestation`
    pub fn trusted_for_attestation(key: KeyEntity) -> Self {
        Self::unary(key, Verb::IsTrustedForAttestation)
    }

    /// `subject speaks-for measurement`
    pub fn speaks_for(subject: KeyEntity, measurement: Measurement) -> Self {
        Self::simple(subject, Verb::SpeaksFor, measurement)
    }

    /// Check the structural rules of the calculus
    ///
    /// `says` clauses need a key subject, a quoted clause and no object;
    /// no other verb may quote a clause. Quoted clauses are checked too.
    pub fn validate(&self) -> Result<()> {
        match (self.verb, &self.clause) {
            (Verb::Says, Some(quoted)) => {
                if self.subject.as_key().is_none() {
                    return Err(CertifierError::malformed(format!(
                        "says clause has {} subject, expected key",
                        self.subject.kind()
                    )));
                }
                if self.object.is_some() {
                    return Err(CertifierError::malformed("says clause must not carry an object"));
                }
                quoted.validate()
            }
            (Verb::Says, None) => Err(CertifierError::malformed("says clause without quoted clause")),
            (verb, Some(_)) => Err(CertifierError::malformed(format!(
                "{} clause must not quote a clause",
                verb
            ))),
            (_, None) => Ok(()),
        }
    }

    /// Speaking key and quoted clause, if this is a `says` clause
    pub fn as_says(&self) -> Option<(&KeyEntity, &Clause)> {
        match (self.verb, self.subject.as_key(), self.clause.as_deref()) {
            (Verb::Says, Some(key), Some(quoted)) => Some((key, quoted)),
            _ => None,
        }
    }

    /// The quoted clause of a `says` clause
    pub fn quoted(&self) -> Option<&Clause> {
        self.as_says().map(|(_, quoted)| quoted)
    }

    /// True for `subject verb` with no object and no quote
    pub fn is_unary(&self, verb: Verb) -> bool {
        self.verb == verb && self.object.is_none() && self.clause.is_none()
    }

    /// Subject key, if the subject is a key
    pub fn subject_key(&self) -> Option<&KeyEntity> {
        self.subject.as_key()
    }

    /// Object measurement, if the object is a measurement
    pub fn object_measurement(&self) -> Option<&Measurement> {
        self.object.as_ref().and_then(Entity::as_measurement)
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CertifierError::from)
    }

    /// Deserialize from JSON bytes and validate structure
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let clause: Clause = serde_json::from_slice(bytes)?;
        clause.validate()?;
        Ok(clause)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.verb)?;
        if let Some(object) = &self.object {
            write!(f, " {}", object)?;
        }
        if let Some(quoted) = &self.clause {
            write!(f, " ({})", quoted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformDescriptor;

    fn key(byte: u8) -> KeyEntity {
        KeyEntity::new(Some(format!("key-{}", byte)), vec![byte; 32])
    }

    #[test]
    fn test_says_clause_shape() {
        let quoted = Clause::trusted_for_attestation(key(2));
        let clause = Clause::says(key(1), quoted.clone());

        assert!(clause.validate().is_ok());
        let (speaker, inner) = clause.as_says().unwrap();
        assert!(speaker.same_key(&key(1)));
        assert_eq!(inner, &quoted);
    }

    #[test]
    fn test_says_requires_key_subject() {
        let clause = Clause {
            subject: Entity::Measurement(Measurement::new(vec![1, 2, 3])),
            verb: Verb::Says,
            object: None,
            clause: Some(Box::new(Clause::is_trusted(key(1)))),
        };
        assert!(clause.validate().is_err());
    }

    #[test]
    fn test_says_requires_quoted_clause() {
        let clause = Clause::unary(key(1), Verb::Says);
        assert!(clause.validate().is_err());
    }

    #[test]
    fn test_non_says_cannot_quote() {
        let clause = Clause {
            subject: Entity::Key(key(1)),
            verb: Verb::IsTrusted,
            object: None,
            clause: Some(Box::new(Clause::is_trusted(key(2)))),
        };
        assert!(clause.validate().is_err());
    }

    #[test]
    fn test_nested_quote_is_validated() {
        let bad_inner = Clause::unary(key(2), Verb::Says);
        let clause = Clause::says(key(1), bad_inner);
        assert!(clause.validate().is_err());
    }

    #[test]
    fn test_from_bytes_rejects_invalid_structure() {
        let bad = Clause::unary(key(1), Verb::Says);
        let bytes = serde_json::to_vec(&bad).unwrap();
        assert!(Clause::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_display() {
        let m = Measurement::new(vec![0xde, 0xad]);
        let clause = Clause::says(
            KeyEntity::new(Some("attest".into()), vec![0x11; 32]),
            Clause::speaks_for(KeyEntity::new(None, vec![0x22; 32]), m),
        );
        assert_eq!(
            clause.to_string(),
            "key[attest:1111111111111111] says (key[2222222222222222] speaks-for measurement[dead])"
        );
    }

    #[test]
    fn test_object_accessors() {
        let m = Measurement::new(vec![9; 32]);
        let clause = Clause::speaks_for(key(3), m.clone());
        assert_eq!(clause.object_measurement(), Some(&m));
        assert!(clause.subject_key().unwrap().same_key(&key(3)));

        let feature = Clause::unary(PlatformDescriptor::new("sev"), Verb::HasTrustedPlatformProperty);
        assert!(feature.is_unary(Verb::HasTrustedPlatformProperty));
        assert!(feature.subject_key().is_none());
    }
}
