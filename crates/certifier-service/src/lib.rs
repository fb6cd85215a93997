//! Certifier Service
//!
//! Network front end for `certifier-core`. An enclave submits a trust
//! request carrying its evidence; the service builds and replays the proof
//! that the enclave key is trusted and, on success, returns an artifact
//! signed with the policy key:
//! - an admission credential for purpose `authentication`
//! - a platform rule for purpose `attestation`
//!
//! ## Transports
//!
//! ### HTTP
//! - `GET /health` - Liveness check
//! - `GET /ready` - Policy bucket counts, policy key id, events recorded
//! - `GET /v1/policy/key` - Policy public key
//! - `GET /v1/events` - Recent certification events
//! - `POST /v1/certify` - Evaluate a trust request
//!
//! ### Framed TCP
//! One JSON `TrustRequest` per connection, 4-byte big-endian length prefix,
//! answered with one `TrustResponse` frame.

pub mod api;
pub mod config;
pub mod core;
pub mod events;
pub mod keys;
pub mod protocol;
pub mod transport;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ConfigError, ServiceConfig};
pub use core::{evaluate_request, IssuedArtifact};
pub use events::{CertificationEvent, EventLog, EventOutcome, FileEventLog, LoggedEvent, MemoryEventLog};
pub use keys::PolicyAuthority;
pub use protocol::{TrustRequest, TrustResponse, TrustStatus};
pub use transport::{request_framed, serve_framed, TransportError, MAX_FRAME_SIZE};
