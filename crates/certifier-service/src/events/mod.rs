//! Certification event log
//!
//! Every evaluated request is recorded with its raw request and response
//! bytes and a one-line outcome message. Two backends:
//! - `MemoryEventLog`: default, keeps the most recent events, lost on restart
//! - `FileEventLog`: `request-<n>` / `response-<n>` files plus an
//!   append-only `events.log` index in a directory

pub mod file;
pub mod memory;

pub use file::FileEventLog;
pub use memory::MemoryEventLog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// Largest `limit` accepted by `EventLog::recent` callers
pub const MAX_RECENT_EVENTS: usize = 500;

/// Events held by a `MemoryEventLog` unless configured otherwise
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1000;

/// Error type for event log operations
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    Succeeded,
    Failed,
}

/// One evaluated trust request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub requesting_enclave_tag: String,
    pub providing_enclave_tag: String,
    pub evidence_type: String,
    pub outcome: EventOutcome,
    /// Failure category, or the issued serial on success
    pub message: String,
    #[serde(skip)]
    pub request: Vec<u8>,
    #[serde(skip)]
    pub response: Vec<u8>,
}

impl CertificationEvent {
    pub fn new(
        requesting_enclave_tag: impl Into<String>,
        providing_enclave_tag: impl Into<String>,
        evidence_type: impl Into<String>,
        outcome: EventOutcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            requesting_enclave_tag: requesting_enclave_tag.into(),
            providing_enclave_tag: providing_enclave_tag.into(),
            evidence_type: evidence_type.into(),
            outcome,
            message: message.into(),
            request: Vec::new(),
            response: Vec::new(),
        }
    }

    /// Attach the raw request and response bytes
    pub fn with_payloads(mut self, request: Vec<u8>, response: Vec<u8>) -> Self {
        self.request = request;
        self.response = response;
        self
    }
}

/// An event with the sequence number the log assigned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: CertificationEvent,
}

/// Event log backend
///
/// Implementations must be thread-safe and support concurrent access.
/// Sequence numbers start at 1 and are unique within a log.
#[async_trait]
pub trait EventLog: Send + Sync + Debug {
    /// Record an event, returning its sequence number
    async fn record(&self, event: CertificationEvent) -> Result<u64, EventLogError>;

    /// Most recent events, newest last
    async fn recent(&self, limit: usize) -> Result<Vec<LoggedEvent>, EventLogError>;

    /// Number of events recorded
    async fn count(&self) -> Result<u64, EventLogError>;
}
