//! Prometheus metrics for expense-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter, TextEncoder,
};

/// Committed batches by path (auto, confirm).
pub static BATCHES_COMMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "expense_batches_committed_total",
        "Total number of entry batches committed",
        &["path"]
    )
    .expect("Failed to register batches_committed_total")
});

/// Entries persisted across all batches.
pub static ENTRIES_COMMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "expense_entries_committed_total",
        "Total number of entries persisted"
    )
    .expect("Failed to register entries_committed_total")
});

/// Messages staged for confirmation.
pub static CONFIRMATIONS_STAGED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "expense_confirmations_staged_total",
        "Total number of partially valid messages staged for confirmation"
    )
    .expect("Failed to register confirmations_staged_total")
});

/// Undo requests by outcome.
pub static UNDO_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "expense_undo_total",
        "Total number of undo requests",
        &["outcome"] // deleted, nothing, error
    )
    .expect("Failed to register undo_total")
});

/// Pipeline rejections for alerting, by error kind.
pub static PIPELINE_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "expense_pipeline_rejections_total",
        "Total number of pipeline calls that ended without the requested effect",
        &["kind"]
    )
    .expect("Failed to register pipeline_rejections_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "expense_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&BATCHES_COMMITTED_TOTAL);
    Lazy::force(&ENTRIES_COMMITTED_TOTAL);
    Lazy::force(&CONFIRMATIONS_STAGED_TOTAL);
    Lazy::force(&UNDO_TOTAL);
    Lazy::force(&PIPELINE_REJECTIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
