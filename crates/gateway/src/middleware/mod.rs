//! HTTP middleware

pub mod auth_gate;
pub mod metrics;

pub use auth_gate::{auth_gate, AuthGate};
pub use metrics::track_requests;
