//! Caller identity extraction.
//!
//! The upstream identity layer verifies the caller and injects
//! `x-caller-id` (stable subject) and `x-caller-email` (verified email)
//! before the request reaches this service. A request without both headers
//! is unauthenticated; there is no fallback identity.

use crate::services::CallerIdentity;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use service_core::error::AppError;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_EMAIL_HEADER: &str = "x-caller-email";

/// Read the verified identity headers. Returns `None` when either header is
/// missing or not valid UTF-8, which callers must treat as unauthenticated.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<CallerIdentity> {
    let external_id = headers.get(CALLER_ID_HEADER)?.to_str().ok()?.trim();
    let email = headers.get(CALLER_EMAIL_HEADER)?.to_str().ok()?.trim();
    if external_id.is_empty() || email.is_empty() {
        return None;
    }
    Some(CallerIdentity {
        external_id: external_id.to_string(),
        email: email.to_string(),
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_headers(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid caller identity"))
        })?;

        let span = tracing::Span::current();
        span.record("caller_id", identity.external_id.as_str());

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_ID_HEADER, HeaderValue::from_static("sub-1"));
        headers.insert(CALLER_EMAIL_HEADER, HeaderValue::from_static("a@b.com"));
        let identity = identity_from_headers(&headers).expect("identity");
        assert_eq!(identity.external_id, "sub-1");
        assert_eq!(identity.email, "a@b.com");
    }

    #[test]
    fn missing_or_blank_headers_mean_unauthenticated() {
        let mut headers = HeaderMap::new();
        assert!(identity_from_headers(&headers).is_none());

        headers.insert(CALLER_ID_HEADER, HeaderValue::from_static("sub-1"));
        assert!(identity_from_headers(&headers).is_none());

        headers.insert(CALLER_EMAIL_HEADER, HeaderValue::from_static("  "));
        assert!(identity_from_headers(&headers).is_none());
    }
}
