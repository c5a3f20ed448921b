//! service-core: Shared infrastructure for the metering workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
