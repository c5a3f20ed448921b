//! Admin gate middleware for privileged routes.

use crate::middleware::identity::identity_from_headers;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

/// Rejects the request before any handler or storage work unless the caller
/// passes the admin allow-list gate. Unresolved identity fails closed.
pub async fn admin_gate_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let identity = identity_from_headers(request.headers());

    if state.admin_gate.is_authorized(identity.as_ref()) {
        return next.run(request).await;
    }

    match identity {
        None => {
            tracing::warn!(path = %request.uri().path(), "Privileged request without verified identity");
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid caller identity"))
                .into_response()
        }
        Some(id) => {
            tracing::warn!(
                path = %request.uri().path(),
                caller_id = %id.external_id,
                "Privileged request from non-administrator"
            );
            AppError::Forbidden(anyhow::anyhow!("Not permitted to perform privileged operations"))
                .into_response()
        }
    }
}
