pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::MeteringConfig;
use crate::services::{AdminGate, CreditLedger, MeteringStore, SettingsCache, SettingsResolver};

/// Shared application state. Everything here is initialized once at startup
/// and injected; components share value copies, never mutable references.
#[derive(Clone)]
pub struct AppState {
    pub config: MeteringConfig,
    pub store: Arc<dyn MeteringStore>,
    pub cache: Arc<SettingsCache>,
    pub settings: Arc<SettingsResolver>,
    pub ledger: Arc<CreditLedger>,
    pub admin_gate: Arc<AdminGate>,
}

pub fn build_router(state: AppState) -> Router {
    // Privileged surface: settings overrides, credit grants, plan sync,
    // ledger inspection. The gate rejects before any handler runs.
    let admin_routes = Router::new()
        .route(
            "/settings/effective",
            get(handlers::settings::get_effective_settings)
                .put(handlers::settings::put_effective_settings),
        )
        .route("/admin/credits/grant", post(handlers::credits::grant_credits))
        .route("/admin/credits/sync", post(handlers::credits::sync_plan))
        .route("/admin/usage/:account_id", get(handlers::credits::list_usage))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_gate_middleware,
        ));

    let metered_routes = Router::new()
        .route("/credits/balance", get(handlers::credits::get_balance))
        .route("/credits/debit", post(handlers::credits::debit_credits))
        .route("/plans", get(handlers::plans::list_plans));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_handler))
        .merge(admin_routes)
        .merge(metered_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.config.observe.policy(),
            middleware::observe_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    caller_id = tracing::field::Empty,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
