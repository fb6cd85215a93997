//! API request handlers

pub mod certify;
pub mod policy;

pub use certify::{certify, AppState};
pub use policy::{get_policy_key, list_events, PolicyKeyResponse, RecentEventsQuery, RecentEventsResponse};
