//! Cryptographic primitives for signed statements and credentials
//!
//! Everything the certifier signs or verifies is a COSE_Sign1 envelope over
//! a JSON payload, signed with an Ed25519 key.
//!
//! Key types:
//! - `KeyPair`: Ed25519 key pair for signing
//! - `PublicKey`: Ed25519 public key for verification
//! - `CoseSigned<T>`: COSE_Sign1 envelope carrying a `T` payload
//! - `StatementVerifier`: the signature-verification seam used by the
//!   evidence pipeline, with `CoseVerifier` as the default implementation

use crate::clause::Clause;
use crate::error::{CertifierError, Result};
use crate::evidence::{AttestationReport, SignedReport, SignedStatement};
use crate::types::KeyEntity;
use coset::{iana, CborSerializable, CoseSign1, CoseSign1Builder, HeaderBuilder};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// COSE algorithm identifier for EdDSA (Ed25519)
const EDDSA_ALG: iana::Algorithm = iana::Algorithm::EdDSA;

/// Payload types that can travel inside a COSE envelope
pub trait SignedPayload: Sized {
    fn to_payload(&self) -> Result<Vec<u8>>;
    fn from_payload(bytes: &[u8]) -> Result<Self>;
}

impl SignedPayload for Clause {
    fn to_payload(&self) -> Result<Vec<u8>> {
        self.to_bytes()
    }

    fn from_payload(bytes: &[u8]) -> Result<Self> {
        Clause::from_bytes(bytes)
    }
}

/// A signed COSE_Sign1 structure
#[derive(Debug, Clone)]
pub struct CoseSigned<T> {
    cose: CoseSign1,
    _marker: std::marker::PhantomData<T>,
}

/// Signed clause (COSE_Sign1 wrapped)
pub type SignedClause = CoseSigned<Clause>;

impl<T> CoseSigned<T> {
    /// Get the raw COSE_Sign1 structure
    pub fn cose(&self) -> &CoseSign1 {
        &self.cose
    }

    /// Get the key ID from the protected header
    pub fn kid(&self) -> Option<String> {
        let kid = &self.cose.protected.header.key_id;
        if kid.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(kid).to_string())
        }
    }

    /// Get the signature bytes
    pub fn signature(&self) -> &[u8] {
        &self.cose.signature
    }

    /// Serialize to CBOR bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.cose.clone().to_vec().map_err(CertifierError::from)
    }

    /// Deserialize from CBOR bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cose = CoseSign1::from_slice(bytes).map_err(CertifierError::from)?;
        Ok(Self {
            cose,
            _marker: std::marker::PhantomData,
        })
    }

    /// Get the payload bytes
    pub fn payload(&self) -> Option<&[u8]> {
        self.cose.payload.as_deref()
    }
}

impl<T: SignedPayload> CoseSigned<T> {
    /// Decode the payload
    ///
    /// Note: This does NOT verify the signature. Use `PublicKey::verify` for that.
    pub fn extract(&self) -> Result<T> {
        let payload = self
            .payload()
            .ok_or(CertifierError::MissingField("payload".into()))?;
        T::from_payload(payload)
    }
}

impl<T> PartialEq for CoseSigned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cose == other.cose
    }
}

impl<T> Serialize for CoseSigned<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let bytes = self.to_bytes().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&STANDARD.encode(bytes))
    }
}

impl<'de, T> Deserialize<'de> for CoseSigned<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let s = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 key pair for signing statements, reports and credentials
#[derive(Clone)]
pub struct KeyPair {
    /// Key identifier
    kid: String,
    /// Ed25519 signing key (private)
    signing_key: SigningKey,
    /// Ed25519 verifying key (public)
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("verifying_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate(kid: impl Into<String>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(kid, signing_key)
    }

    /// Create a key pair from an existing signing key
    pub fn from_signing_key(kid: impl Into<String>, signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            kid: kid.into(),
            signing_key,
            verifying_key,
        }
    }

    /// Create a key pair from raw secret key bytes
    pub fn from_bytes(kid: impl Into<String>, bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(kid, SigningKey::from_bytes(bytes))
    }

    /// Get the key identifier
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            kid: self.kid.clone(),
            verifying_key: self.verifying_key,
        }
    }

    /// The public half as a calculus entity, named by the key ID
    pub fn entity(&self) -> KeyEntity {
        KeyEntity::new(Some(self.kid.clone()), self.verifying_key.to_bytes().to_vec())
    }

    /// Get the raw signing key bytes
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a payload and wrap it in COSE_Sign1
    pub fn sign<T: SignedPayload>(&self, payload: &T) -> Result<CoseSigned<T>> {
        let bytes = payload.to_payload()?;
        let cose = self.sign_cose(&bytes)?;
        Ok(CoseSigned {
            cose,
            _marker: std::marker::PhantomData,
        })
    }

    /// Sign a clause and attach this key as the signer
    pub fn sign_statement(&self, clause: &Clause) -> Result<SignedStatement> {
        Ok(SignedStatement {
            signing_key: self.entity(),
            statement: self.sign(clause)?,
        })
    }

    /// Sign an attestation report and attach this key as the signer
    pub fn sign_report(&self, report: &AttestationReport) -> Result<SignedReport> {
        Ok(SignedReport {
            signing_key: self.entity(),
            report: self.sign(report)?,
        })
    }

    fn sign_cose(&self, payload: &[u8]) -> Result<CoseSign1> {
        let protected = HeaderBuilder::new()
            .algorithm(EDDSA_ALG)
            .key_id(self.kid.as_bytes().to_vec())
            .build();

        let builder = CoseSign1Builder::new()
            .protected(protected)
            .payload(payload.to_vec());

        let signed_builder = builder.try_create_signature(&[], |data| {
            let signature = self.signing_key.sign(data);
            Ok::<_, CertifierError>(signature.to_bytes().to_vec())
        })?;

        Ok(signed_builder.build())
    }
}

/// Ed25519 public key for verification
#[derive(Clone)]
pub struct PublicKey {
    /// Key identifier (empty when the key is unnamed)
    kid: String,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey").field("kid", &self.kid).finish()
    }
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(kid: impl Into<String>, bytes: &[u8; 32]) -> Result<Self> {
        let verifying_key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| CertifierError::CryptoError(e.to_string()))?;
        Ok(Self {
            kid: kid.into(),
            verifying_key,
        })
    }

    /// Recover a verification key from a calculus key entity
    pub fn from_entity(entity: &KeyEntity) -> Result<Self> {
        let bytes: [u8; 32] = entity
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| CertifierError::CryptoError("Invalid key length".into()))?;
        Self::from_bytes(entity.name.clone().unwrap_or_default(), &bytes)
    }

    /// Get the key identifier
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Get the raw verifying key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a signed envelope and decode its payload
    pub fn verify<T: SignedPayload>(&self, signed: &CoseSigned<T>) -> Result<T> {
        self.verify_cose(&signed.cose)?;
        signed.extract()
    }

    fn verify_cose(&self, cose: &CoseSign1) -> Result<()> {
        // Key IDs are only compared when both sides carry one
        let kid = &cose.protected.header.key_id;
        if !kid.is_empty() && !self.kid.is_empty() {
            let kid_str = String::from_utf8_lossy(kid);
            if kid_str != self.kid {
                return Err(CertifierError::CryptoError(format!(
                    "Key ID mismatch: expected '{}', got '{}'",
                    self.kid, kid_str
                )));
            }
        }

        let sig_structure = cose.tbs_data(&[]);

        let signature_bytes: [u8; 64] = cose
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| CertifierError::CryptoError("Invalid signature length".into()))?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.verifying_key
            .verify(&sig_structure, &signature)
            .map_err(|e| CertifierError::CryptoError(e.to_string()))
    }
}

/// Signature verification seam of the evidence pipeline
///
/// Implementations authenticate a signed item against the key that claims
/// to have signed it and return the decoded payload. Structural checks on
/// the decoded clause are the pipeline's job, not the verifier's.
pub trait StatementVerifier: Send + Sync {
    /// Verify a signed clause against its claimed signer
    fn verify_signed_statement(
        &self,
        statement: &SignedStatement,
        claimed_signer: &KeyEntity,
    ) -> Result<Clause>;

    /// Verify a platform attestation report against its claimed signer
    fn verify_report(
        &self,
        report: &SignedReport,
        claimed_signer: &KeyEntity,
    ) -> Result<AttestationReport>;
}

/// Ed25519 COSE_Sign1 verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct CoseVerifier;

impl CoseVerifier {
    fn verify_envelope<T: SignedPayload>(
        signed: &CoseSigned<T>,
        claimed_signer: &KeyEntity,
    ) -> Result<T> {
        let key = PublicKey::from_entity(claimed_signer)
            .map_err(|e| CertifierError::UnverifiableSignature(e.to_string()))?;
        key.verify_cose(signed.cose())
            .map_err(|e| CertifierError::UnverifiableSignature(e.to_string()))?;
        signed.extract()
    }
}

impl StatementVerifier for CoseVerifier {
    fn verify_signed_statement(
        &self,
        statement: &SignedStatement,
        claimed_signer: &KeyEntity,
    ) -> Result<Clause> {
        Self::verify_envelope(&statement.statement, claimed_signer)
    }

    fn verify_report(
        &self,
        report: &SignedReport,
        claimed_signer: &KeyEntity,
    ) -> Result<AttestationReport> {
        Self::verify_envelope(&report.report, claimed_signer)
    }
}
