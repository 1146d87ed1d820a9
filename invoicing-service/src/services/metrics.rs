//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, register_int_counter,
    Counter, CounterVec, HistogramVec, IntCounter, TextEncoder,
};

/// Invoices committed by the invoice workflow.
pub static INVOICES_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "invoicing_invoices_created_total",
        "Total number of invoices committed"
    )
    .expect("Failed to register invoices_created_total")
});

/// Rejected or failed invoice attempts by reason.
pub static INVOICE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_failures_total",
        "Total number of failed invoice attempts by reason",
        &["reason"] // product_not_found, insufficient_stock, customer_not_found, invalid_request, storage
    )
    .expect("Failed to register invoice_failures_total")
});

/// Invoiced amount, summed over committed invoices.
pub static INVOICE_AMOUNT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("invoicing_invoice_amount_total", "Total invoiced amount")
        .expect("Failed to register invoice_amount_total")
});

/// Authentication and authorization rejections.
pub static AUTH_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_auth_failures_total",
        "Total number of rejected credentials and role checks",
        &["kind"] // unauthenticated, forbidden, bad_login
    )
    .expect("Failed to register auth_failures_total")
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

/// Initialize all metrics (forces lazy initialization) and the HTTP recorder.
pub fn init_metrics() {
    service_core::observability::init_http_metrics();
    Lazy::force(&INVOICES_CREATED_TOTAL);
    Lazy::force(&INVOICE_FAILURES_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&AUTH_FAILURES_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get service and HTTP metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut text = encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default();
    text.push_str(&service_core::observability::render_http_metrics());
    text
}
