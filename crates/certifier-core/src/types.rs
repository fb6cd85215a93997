//! Principals and verbs of the trust calculus

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Principal named by a clause
///
/// Equality is by value. Key identity for signer checks and policy lookup
/// uses [`KeyEntity::same_key`], which ignores the optional key name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "value", rename_all = "kebab-case")]
pub enum Entity {
    /// A public key
    Key(KeyEntity),
    /// A program or firmware measurement
    Measurement(Measurement),
    /// A platform and its properties
    Platform(PlatformDescriptor),
    /// A platform running a particular measurement
    Environment(EnvironmentDescriptor),
}

impl Entity {
    /// Entity kind name used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Key(_) => "key",
            Entity::Measurement(_) => "measurement",
            Entity::Platform(_) => "platform",
            Entity::Environment(_) => "environment",
        }
    }

    /// The key, if this is a key entity
    pub fn as_key(&self) -> Option<&KeyEntity> {
        match self {
            Entity::Key(k) => Some(k),
            _ => None,
        }
    }

    /// The measurement, if this is a measurement entity
    pub fn as_measurement(&self) -> Option<&Measurement> {
        match self {
            Entity::Measurement(m) => Some(m),
            _ => None,
        }
    }

    /// The platform descriptor, if this is a platform entity
    pub fn as_platform(&self) -> Option<&PlatformDescriptor> {
        match self {
            Entity::Platform(p) => Some(p),
            _ => None,
        }
    }
}

impl From<KeyEntity> for Entity {
    fn from(key: KeyEntity) -> Self {
        Entity::Key(key)
    }
}

impl From<Measurement> for Entity {
    fn from(m: Measurement) -> Self {
        Entity::Measurement(m)
    }
}

impl From<PlatformDescriptor> for Entity {
    fn from(p: PlatformDescriptor) -> Self {
        Entity::Platform(p)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Key(k) => write!(f, "{}", k),
            Entity::Measurement(m) => write!(f, "{}", m),
            Entity::Platform(p) => write!(f, "{}", p),
            Entity::Environment(e) => write!(f, "environment[{}, {}]", e.platform, e.measurement),
        }
    }
}

/// Ed25519 public key material with an optional human-readable name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntity {
    /// Key name (becomes the COSE key ID when signing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw 32-byte Ed25519 verifying key
    #[serde(with = "serde_bytes_base64")]
    pub public_key: Vec<u8>,
}

impl KeyEntity {
    /// Create a key entity from raw verifying key bytes
    pub fn new(name: Option<String>, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            public_key: public_key.into(),
        }
    }

    /// Public-key-material equality, ignoring names
    pub fn same_key(&self, other: &KeyEntity) -> bool {
        self.public_key == other.public_key
    }

    /// Name to use where a label is required
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

impl fmt::Display for KeyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = hex::encode(&self.public_key[..self.public_key.len().min(8)]);
        match &self.name {
            Some(name) => write!(f, "key[{}:{}]", name, prefix),
            None => write!(f, "key[{}]", prefix),
        }
    }
}

/// Digest identifying a specific program or firmware image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measurement(#[serde(with = "serde_bytes_base64")] Vec<u8>);

impl Measurement {
    /// Wrap digest bytes
    pub fn new(digest: impl Into<Vec<u8>>) -> Self {
        Self(digest.into())
    }

    /// The raw digest
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding of the digest
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "measurement[{}]", self.to_hex())
    }
}

/// Platform type plus the properties it was measured with
///
/// Common properties for SEV-SNP are `debug`, `migrate`, `smt` and the
/// API/firmware version floors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Platform type ("amd-sev-snp", "sgx", "simulated-enclave", ...)
    pub platform_type: String,

    /// Named properties, compared by exact value
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PlatformDescriptor {
    pub fn new(platform_type: impl Into<String>) -> Self {
        Self {
            platform_type: platform_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property (builder pattern)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform[{}", self.platform_type)?;
        for (name, value) in &self.properties {
            write!(f, ", {}={}", name, value)?;
        }
        write!(f, "]")
    }
}

/// A platform running a particular measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub platform: PlatformDescriptor,
    pub measurement: Measurement,
}

/// Fixed verb vocabulary of the calculus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verb {
    IsTrusted,
    IsTrustedForAttestation,
    IsTrustedForAuthentication,
    SpeaksFor,
    Says,
    HasTrustedPlatformProperty,
    IsEnvironment,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::IsTrusted => "is-trusted",
            Verb::IsTrustedForAttestation => "is-trusted-for-attestation",
            Verb::IsTrustedForAuthentication => "is-trusted-for-authentication",
            Verb::SpeaksFor => "speaks-for",
            Verb::Says => "says",
            Verb::HasTrustedPlatformProperty => "has-trusted-platform-property",
            Verb::IsEnvironment => "is-environment",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the requester wants its key trusted for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// Admission credential for authenticating to peers (default)
    #[default]
    Authentication,
    /// Platform rule letting the key vouch for other enclaves
    Attestation,
}

impl Purpose {
    /// Interpret a request's purpose string
    ///
    /// Only the exact string `"attestation"` selects attestation; anything
    /// else, including an absent purpose, means authentication.
    pub fn from_request(purpose: Option<&str>) -> Self {
        match purpose {
            Some("attestation") => Purpose::Attestation,
            _ => Purpose::Authentication,
        }
    }

    /// Verb of the goal clause for this purpose
    pub fn goal_verb(&self) -> Verb {
        match self {
            Purpose::Authentication => Verb::IsTrustedForAuthentication,
            Purpose::Attestation => Verb::IsTrustedForAttestation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Authentication => "authentication",
            Purpose::Attestation => "attestation",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base64 serialization for byte fields
pub mod serde_bytes_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
