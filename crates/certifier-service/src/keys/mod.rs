//! Policy key handling
//!
//! - `authority`: the policy key as credential issuer, with the serial counter
//! - `loader`: reading the policy key and policy statements from disk

mod authority;
mod loader;

pub use authority::PolicyAuthority;
pub use loader::{encode_policy_key, load_policy_file, load_policy_key, write_policy_file};
