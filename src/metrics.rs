//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("agora_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "agora_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("agora_db_queries_total", "Total number of database queries"),
        &["operation", "table"]
    ).expect("metric can be created");
    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "agora_db_query_duration_seconds",
            "Database query duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation", "table"]
    ).expect("metric can be created");

    // Engagement Metrics
    pub static ref ENGAGEMENT_TOGGLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("agora_engagement_toggles_total", "Like/follow/bookmark toggles by outcome"),
        &["relation", "action", "outcome"]
    ).expect("metric can be created");

    // Relay Metrics
    pub static ref RELAY_CONNECTIONS_ACTIVE: IntGauge = IntGauge::new(
        "agora_relay_connections_active",
        "Current number of open relay connections"
    ).expect("metric can be created");
    pub static ref RELAY_MESSAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("agora_relay_messages_total", "Total number of relay messages broadcast"),
        &["message_type"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("agora_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(DB_QUERIES_TOTAL.clone()))
            .expect("DB_QUERIES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
            .expect("DB_QUERY_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ENGAGEMENT_TOGGLES_TOTAL.clone()))
            .expect("ENGAGEMENT_TOGGLES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(RELAY_CONNECTIONS_ACTIVE.clone()))
            .expect("RELAY_CONNECTIONS_ACTIVE can be registered");
        REGISTRY
            .register(Box::new(RELAY_MESSAGES_TOTAL.clone()))
            .expect("RELAY_MESSAGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one database round-trip.
pub fn observe_db_query(operation: &str, table: &str, elapsed: Duration) {
    DB_QUERIES_TOTAL
        .with_label_values(&[operation, table])
        .inc();
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(elapsed.as_secs_f64());
}

/// Record the outcome of a like/follow/bookmark toggle.
pub fn record_toggle(relation: &str, action: &str, changed: bool) {
    let outcome = if changed { "changed" } else { "noop" };
    ENGAGEMENT_TOGGLES_TOTAL
        .with_label_values(&[relation, action, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
        assert!(!REGISTRY.gather().is_empty());
    }

    #[test]
    fn record_toggle_labels_noop() {
        let before = ENGAGEMENT_TOGGLES_TOTAL
            .with_label_values(&["like", "create", "noop"])
            .get();
        record_toggle("like", "create", false);
        let after = ENGAGEMENT_TOGGLES_TOTAL
            .with_label_values(&["like", "create", "noop"])
            .get();
        assert!(after > before);
    }
}
