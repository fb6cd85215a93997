//! # Certifier Core
//!
//! Trust calculus and proof construction for a confidential-computing
//! certifier. An enclave submits signed evidence about itself; the certifier
//! combines it with administrator policy and builds a proof that the
//! enclave's key is trusted for authentication or attestation.
//!
//! ## Pipeline
//!
//! 1. **Normalize**: authenticate every evidence item and lay down the
//!    initial facts, anchored at `policyKey is-trusted`
//! 2. **Augment**: add the policy statements trusting the measurement and
//!    the platform key
//! 3. **Synthesize**: build the canonical proof of the goal
//! 4. **Verify**: replay the proof before anything is issued
//!
//! [`Certifier`] runs steps 1-3; [`verify_proof`] is step 4.

pub mod augment;
pub mod clause;
pub mod credential;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod evidence;
pub mod normalize;
pub mod policy;
pub mod proof;
pub mod synthesize;
pub mod types;
pub mod verify;

pub use clause::Clause;
pub use credential::{
    AdmissionCredential, PlatformRule, SignedCredential, SignedPlatformRule, Validity,
    CERTIFIER_ORGANIZATION,
};
pub use crypto::{CoseSigned, CoseVerifier, KeyPair, PublicKey, StatementVerifier};
pub use dispatch::{Certification, Certifier};
pub use error::{CertifierError, FailureCategory, Result};
pub use evidence::{
    AttestationReport, EvidenceFormat, EvidenceItem, EvidencePackage, ReportPlatform,
    SignedReport, SignedStatement, VSE_VERIFIER,
};
pub use policy::PolicyIndex;
pub use proof::{Proof, ProofStep, ProvedStatements, RuleId};
pub use types::{Entity, KeyEntity, Measurement, PlatformDescriptor, Purpose, Verb};
pub use verify::verify_proof;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
