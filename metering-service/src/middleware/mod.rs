//! HTTP middleware for metering-service.

pub mod admin;
pub mod identity;
pub mod observe;

pub use admin::admin_gate_middleware;
pub use identity::{identity_from_headers, CALLER_EMAIL_HEADER, CALLER_ID_HEADER};
pub use observe::{observe_middleware, LogSeverity, ObservePolicy, OutcomeClass};
