//! Error types for the certifier core

use thiserror::Error;

/// Result type alias using CertifierError
pub type Result<T> = std::result::Result<T, CertifierError>;

/// Errors that can occur while evaluating a trust request
///
/// Every variant is terminal for the request being evaluated. Use
/// [`CertifierError::category`] to map a variant onto the coarse failure
/// taxonomy reported to operators.
#[derive(Error, Debug)]
pub enum CertifierError {
    /// Evidence has the wrong shape or ordering for its declared format
    #[error("Malformed evidence: {0}")]
    MalformedEvidence(String),

    /// Evidence type tag is not one of the supported formats
    #[error("Unknown evidence type: {0}")]
    UnknownEvidenceType(String),

    /// Evidence package names a prover other than the VSE verifier
    #[error("Unsupported prover type: {0}")]
    UnsupportedProver(String),

    /// A signature did not verify, or a signer does not match its claim
    #[error("Unverifiable signature: {0}")]
    UnverifiableSignature(String),

    /// No administrator policy covers a required measurement, key or platform
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// A proof does not replay against its proved statements
    #[error("Proof unsound: {0}")]
    ProofUnsound(String),

    /// COSE encoding/decoding error
    #[error("COSE error: {0}")]
    CoseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Cryptographic error
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Coarse failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Shape/order violation, wrong prover type, unknown evidence tag
    MalformedEvidence,
    /// Signature rejected or signer-key mismatch
    UnverifiableSignature,
    /// No matching measurement, platform-key or feature policy
    PolicyNotFound,
    /// An assembled proof failed replay (internal bug, never expected)
    ProofUnsound,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureCategory::MalformedEvidence => "malformed-evidence",
            FailureCategory::UnverifiableSignature => "unverifiable-signature",
            FailureCategory::PolicyNotFound => "policy-not-found",
            FailureCategory::ProofUnsound => "proof-unsound",
        };
        f.write_str(name)
    }
}

impl CertifierError {
    /// Map this error onto its failure category
    pub fn category(&self) -> FailureCategory {
        match self {
            CertifierError::MalformedEvidence(_)
            | CertifierError::UnknownEvidenceType(_)
            | CertifierError::UnsupportedProver(_)
            | CertifierError::CoseError(_)
            | CertifierError::SerializationError(_)
            | CertifierError::MissingField(_) => FailureCategory::MalformedEvidence,
            CertifierError::UnverifiableSignature(_) | CertifierError::CryptoError(_) => {
                FailureCategory::UnverifiableSignature
            }
            CertifierError::PolicyNotFound(_) => FailureCategory::PolicyNotFound,
            CertifierError::ProofUnsound(_) => FailureCategory::ProofUnsound,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        CertifierError::MalformedEvidence(msg.into())
    }
}

impl From<ed25519_dalek::SignatureError> for CertifierError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        CertifierError::CryptoError(err.to_string())
    }
}

impl From<serde_json::Error> for CertifierError {
    fn from(err: serde_json::Error) -> Self {
        CertifierError::SerializationError(err.to_string())
    }
}

impl From<coset::CoseError> for CertifierError {
    fn from(err: coset::CoseError) -> Self {
        CertifierError::CoseError(format!("{:?}", err))
    }
}
