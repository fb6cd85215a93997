//! Service configuration from the environment
//!
//! | Variable | Default |
//! |---|---|
//! | `CERTIFIER_HOST` | `0.0.0.0` |
//! | `CERTIFIER_HTTP_PORT` | `8080` |
//! | `CERTIFIER_FRAMED_PORT` | unset (framed listener disabled) |
//! | `CERTIFIER_POLICY_KEY_FILE` | unset (ephemeral key) |
//! | `CERTIFIER_POLICY_KEY_NAME` | `policy-key` |
//! | `CERTIFIER_POLICY_FILE` | unset (empty policy) |
//! | `CERTIFIER_CREDENTIAL_DURATION_SECS` | one year |
//! | `CERTIFIER_EVENT_LOG_DIR` | unset (in-memory event log) |
//! | `CERTIFIER_EVENT_LOG_CAPACITY` | `1000` (in-memory log only, minimum `500`) |
//! | `CERTIFIER_LOG_LEVEL` | `info` (`off`, `error`, `warn`, `info`, `debug`, `trace`) |

use chrono::Duration;
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use certifier_core::credential::default_credential_duration;

use crate::events::{DEFAULT_EVENT_LOG_CAPACITY, MAX_RECENT_EVENTS};

/// Errors raised while configuring the service at start-up
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy key in {path}: {reason}")]
    InvalidKey { path: PathBuf, reason: String },

    #[error("Invalid policy file {path}: {source}")]
    InvalidPolicy {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub http_port: u16,
    pub framed_port: Option<u16>,
    pub policy_key_file: Option<PathBuf>,
    pub policy_key_name: String,
    pub policy_file: Option<PathBuf>,
    pub credential_duration: Duration,
    pub event_log_dir: Option<PathBuf>,
    /// In-memory event log capacity, at least `MAX_RECENT_EVENTS`
    pub event_log_capacity: usize,
    pub log_level: LevelFilter,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            http_port: 8080,
            framed_port: None,
            policy_key_file: None,
            policy_key_name: "policy-key".into(),
            policy_file: None,
            credential_duration: default_credential_duration(),
            event_log_dir: None,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            log_level: LevelFilter::INFO,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Read configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let http_port = match lookup("CERTIFIER_HTTP_PORT") {
            Some(value) => parse_port("CERTIFIER_HTTP_PORT", value)?,
            None => defaults.http_port,
        };

        let framed_port = lookup("CERTIFIER_FRAMED_PORT")
            .map(|value| parse_port("CERTIFIER_FRAMED_PORT", value))
            .transpose()?;

        let credential_duration = match lookup("CERTIFIER_CREDENTIAL_DURATION_SECS") {
            Some(value) => {
                let secs: i64 = value
                    .parse()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        var: "CERTIFIER_CREDENTIAL_DURATION_SECS",
                        value: value.clone(),
                    })?;
                Duration::seconds(secs)
            }
            None => defaults.credential_duration,
        };

        let event_log_capacity = match lookup("CERTIFIER_EVENT_LOG_CAPACITY") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity >= MAX_RECENT_EVENTS)
                .ok_or(ConfigError::InvalidValue {
                    var: "CERTIFIER_EVENT_LOG_CAPACITY",
                    value,
                })?,
            None => defaults.event_log_capacity,
        };

        let log_level = match lookup("CERTIFIER_LOG_LEVEL") {
            Some(value) => value
                .trim()
                .parse::<LevelFilter>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "CERTIFIER_LOG_LEVEL",
                    value,
                })?,
            None => defaults.log_level,
        };

        Ok(Self {
            host: lookup("CERTIFIER_HOST").unwrap_or(defaults.host),
            http_port,
            framed_port,
            policy_key_file: lookup("CERTIFIER_POLICY_KEY_FILE").map(PathBuf::from),
            policy_key_name: lookup("CERTIFIER_POLICY_KEY_NAME").unwrap_or(defaults.policy_key_name),
            policy_file: lookup("CERTIFIER_POLICY_FILE").map(PathBuf::from),
            credential_duration,
            event_log_dir: lookup("CERTIFIER_EVENT_LOG_DIR").map(PathBuf::from),
            event_log_capacity,
            log_level,
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn framed_addr(&self) -> Option<String> {
        self.framed_port.map(|port| format!("{}:{}", self.host, port))
    }
}

fn parse_port(var: &'static str, value: String) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}
