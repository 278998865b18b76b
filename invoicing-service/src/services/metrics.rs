//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec,
    HistogramVec, IntCounterVec, TextEncoder,
};

/// Invoice lifecycle events.
pub static INVOICES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoicing_invoices_total",
        "Total number of invoice lifecycle events",
        &["event"] // created, updated, paid, recomputed, deleted
    )
    .expect("Failed to register invoices_total")
});

/// Audit transactions appended, by type.
pub static TRANSACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoicing_transactions_total",
        "Total number of transactions by type",
        &["transaction_type"]
    )
    .expect("Failed to register transactions_total")
});

/// Money recorded in audit transactions, by type.
pub static TRANSACTION_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_transaction_amount_total",
        "Total transaction amount by type",
        &["transaction_type"]
    )
    .expect("Failed to register transaction_amount_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by kind",
        &["kind"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&TRANSACTIONS_TOTAL);
    Lazy::force(&TRANSACTION_AMOUNT_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    service_core::middleware::metrics::init_http_metrics();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
