//! Request evaluation for the certifier service

mod evaluate;

pub use evaluate::{certify, evaluate_request, IssuedArtifact};
