//! Metrics module for metering-service.
//! Provides Prometheus metrics for credit operations and the API surface.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "metering_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Successful debits counter
pub static CREDIT_DEBITS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Credits charged counter (amount, not calls)
pub static CREDITS_CHARGED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Credit grants counter
pub static CREDIT_GRANTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Settings cache hit/miss counters
pub static SETTINGS_CACHE_LOOKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// API request counter
pub static API_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// API request duration histogram
pub static API_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    CREDIT_DEBITS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "metering_credit_debits_total",
                "Successful debits by operation type and outcome"
            ),
            &["operation", "outcome"]
        )
        .expect("Failed to register CREDIT_DEBITS_TOTAL")
    });

    CREDITS_CHARGED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "metering_credits_charged_total",
                "Total credits charged by operation type"
            ),
            &["operation"]
        )
        .expect("Failed to register CREDITS_CHARGED_TOTAL")
    });

    CREDIT_GRANTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "metering_credit_grants_total",
                "Credit grants by source (admin grant, plan sync)"
            ),
            &["source"]
        )
        .expect("Failed to register CREDIT_GRANTS_TOTAL")
    });

    SETTINGS_CACHE_LOOKUPS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "metering_settings_cache_lookups_total",
                "Settings cache lookups by key and result"
            ),
            &["key", "result"]
        )
        .expect("Failed to register SETTINGS_CACHE_LOOKUPS_TOTAL")
    });

    API_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("metering_api_requests_total", "API requests"),
            &["method", "route", "status"]
        )
        .expect("Failed to register API_REQUESTS_TOTAL")
    });

    // Custom buckets sized for settings reads and single-row ledger writes
    API_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "metering_api_request_duration_seconds",
                "API request duration",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
            ),
            &["method", "route"]
        )
        .expect("Failed to register API_REQUEST_DURATION")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("metering_errors_total", "Errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a debit attempt.
pub fn record_debit(operation: &str, outcome: &str) {
    if let Some(counter) = CREDIT_DEBITS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}

/// Record credits charged on a successful debit.
pub fn record_credits_charged(operation: &str, amount: i64) {
    if let Some(counter) = CREDITS_CHARGED_TOTAL.get() {
        counter
            .with_label_values(&[operation])
            .inc_by(amount.max(0) as u64);
    }
}

/// Record a credit grant.
pub fn record_grant(source: &str) {
    if let Some(counter) = CREDIT_GRANTS_TOTAL.get() {
        counter.with_label_values(&[source]).inc();
    }
}

/// Record a settings cache lookup.
pub fn record_cache_lookup(key: &str, hit: bool) {
    if let Some(counter) = SETTINGS_CACHE_LOOKUPS_TOTAL.get() {
        let result = if hit { "hit" } else { "miss" };
        counter.with_label_values(&[key, result]).inc();
    }
}

/// Record an API request.
pub fn record_api_request(method: &str, route: &str, status: u16) {
    if let Some(counter) = API_REQUESTS_TOTAL.get() {
        counter
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
    }
}

/// Record API request duration.
pub fn record_api_request_duration(method: &str, route: &str, duration_secs: f64) {
    if let Some(histogram) = API_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[method, route])
            .observe(duration_secs);
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
