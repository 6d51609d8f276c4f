//! Prometheus metrics for duty-ledger-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Handle for the `metrics` facade recorder fed by the HTTP middleware.
static HTTP_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Duty rate resolutions by outcome (matched, not_found).
pub static DUTY_RESOLUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "duty_resolutions_total",
        "Total number of duty rate resolutions",
        &["category", "outcome"]
    )
    .expect("Failed to register duty_resolutions_total")
});

/// Ledger appends by transaction type and status (no brand label).
pub static LEDGER_APPENDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ledger_appends_total",
        "Total number of ledger transactions appended",
        &["transaction_type", "status"]
    )
    .expect("Failed to register ledger_appends_total")
});

/// Posting adapter outcomes by source record type.
pub static POSTINGS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ledger_postings_total",
        "Total number of source records posted to the ledger",
        &["source", "outcome"]  // duty_entry/outbound_shipment x posted/failed/skipped
    )
    .expect("Failed to register ledger_postings_total")
});

/// Reconciliation sweep results.
pub static RECONCILIATION_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ledger_reconciliation_records_total",
        "Records handled by the posting reconciliation sweep",
        &["outcome"]  // reposted, relinked, failed
    )
    .expect("Failed to register ledger_reconciliation_records_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "duty_ledger_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "duty_ledger_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization) and install the
/// HTTP metrics recorder once per process.
pub fn init_metrics() {
    Lazy::force(&DUTY_RESOLUTIONS_TOTAL);
    Lazy::force(&LEDGER_APPENDS_TOTAL);
    Lazy::force(&POSTINGS_TOTAL);
    Lazy::force(&RECONCILIATION_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);

    if HTTP_METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = HTTP_METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "HTTP metrics recorder not installed"),
        }
    }
}

pub fn record_resolution(category: &str, outcome: &str) {
    DUTY_RESOLUTIONS_TOTAL
        .with_label_values(&[category, outcome])
        .inc();
}

pub fn record_ledger_append(transaction_type: &str, status: &str) {
    LEDGER_APPENDS_TOTAL
        .with_label_values(&[transaction_type, status])
        .inc();
}

pub fn record_posting(source: &str, outcome: &str) {
    POSTINGS_TOTAL.with_label_values(&[source, outcome]).inc();
}

pub fn record_reconciliation(outcome: &str) {
    RECONCILIATION_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut output = encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default();

    if let Some(handle) = HTTP_METRICS_HANDLE.get() {
        output.push_str(&handle.render());
    }

    output
}
