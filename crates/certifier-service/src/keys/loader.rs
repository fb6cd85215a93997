//! Loading the policy key and policy statements from disk
//!
//! - policy key file: base64 of the 32-byte Ed25519 secret key
//! - policy file: JSON array of signed statements, in priority order

use base64::{engine::general_purpose::STANDARD, Engine};
use certifier_core::{KeyPair, SignedStatement};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::ConfigError;

/// Read the policy key pair
pub fn load_policy_key(path: &Path, kid: &str) -> Result<KeyPair, ConfigError> {
    let encoded = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConfigError::InvalidKey {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let secret: [u8; 32] = bytes.as_slice().try_into().map_err(|_| ConfigError::InvalidKey {
        path: path.to_path_buf(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })?;

    let key_pair = KeyPair::from_bytes(kid, &secret);
    info!(path = %path.display(), kid, "Loaded policy key");
    Ok(key_pair)
}

/// Base64 encoding of a policy key, as stored in the key file
pub fn encode_policy_key(key_pair: &KeyPair) -> String {
    STANDARD.encode(key_pair.signing_key_bytes())
}

/// Read the policy statements
pub fn load_policy_file(path: &Path) -> Result<Vec<SignedStatement>, ConfigError> {
    let contents = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let statements: Vec<SignedStatement> =
        serde_json::from_slice(&contents).map_err(|source| ConfigError::InvalidPolicy {
            path: path.to_path_buf(),
            source,
        })?;

    info!(path = %path.display(), count = statements.len(), "Loaded policy statements");
    Ok(statements)
}

/// Write policy statements in the format `load_policy_file` reads
pub fn write_policy_file(path: &Path, statements: &[SignedStatement]) -> Result<(), ConfigError> {
    let contents = serde_json::to_vec_pretty(statements).map_err(|source| ConfigError::InvalidPolicy {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
