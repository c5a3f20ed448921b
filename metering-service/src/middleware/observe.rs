//! Request instrumentation wrapper.
//!
//! Decorates every route handler: times the call, classifies the outcome,
//! records metrics, and emits one structured log line when the configured
//! policy says so. The wrapped handler's response passes through unchanged;
//! this layer never participates in control flow.

use crate::services::metrics::{record_api_request, record_api_request_duration};
use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Outcome classification for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Success,
    ClientError,
    ServerError,
}

impl OutcomeClass {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            OutcomeClass::ServerError
        } else if status.is_client_error() {
            OutcomeClass::ClientError
        } else {
            OutcomeClass::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeClass::Success => "success",
            OutcomeClass::ClientError => "client_error",
            OutcomeClass::ServerError => "server_error",
        }
    }

    fn severity(&self) -> LogSeverity {
        match self {
            OutcomeClass::Success => LogSeverity::Info,
            OutcomeClass::ClientError => LogSeverity::Warn,
            OutcomeClass::ServerError => LogSeverity::Error,
        }
    }
}

/// Minimum severity for the policy threshold. Ordering matters:
/// Info < Warn < Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogSeverity {
    Info,
    #[default]
    Warn,
    Error,
}

impl std::str::FromStr for LogSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(LogSeverity::Info),
            "warn" => Ok(LogSeverity::Warn),
            "error" => Ok(LogSeverity::Error),
            _ => Err(format!("Invalid log severity: {}", s)),
        }
    }
}

/// Verbosity policy for API request logging. Metrics are always recorded;
/// the log line is emitted only when `enabled` and both thresholds are met.
#[derive(Debug, Clone)]
pub struct ObservePolicy {
    pub enabled: bool,
    pub min_severity: LogSeverity,
    pub min_status: u16,
}

impl Default for ObservePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_severity: LogSeverity::Warn,
            min_status: 400,
        }
    }
}

pub async fn observe_middleware(
    State(policy): State<ObservePolicy>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Route template, not the raw path: keeps metric label cardinality bounded.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let outcome = OutcomeClass::from_status(status);

    record_api_request(&method, &route, status.as_u16());
    record_api_request_duration(&method, &route, elapsed.as_secs_f64());

    let severity = outcome.severity();
    if policy.enabled && severity >= policy.min_severity && status.as_u16() >= policy.min_status {
        match severity {
            LogSeverity::Error => tracing::error!(
                method = %method,
                route = %route,
                status = status.as_u16(),
                outcome = outcome.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "API request"
            ),
            LogSeverity::Warn => tracing::warn!(
                method = %method,
                route = %route,
                status = status.as_u16(),
                outcome = outcome.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "API request"
            ),
            LogSeverity::Info => tracing::info!(
                method = %method,
                route = %route,
                status = status.as_u16(),
                outcome = outcome.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "API request"
            ),
        }
    }

    response
}
