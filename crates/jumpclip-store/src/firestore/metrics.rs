//! Firestore request metrics.

use metrics::{counter, histogram};

// ============================================================================
// Metric names
// ============================================================================

pub mod names {
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";
    /// Optimistic-concurrency conflicts, by collection
    pub const CONFLICTS_TOTAL: &str = "firestore_conflicts_total";
}

// ============================================================================
// Recording
// ============================================================================

pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_conflict(collection: &str) {
    counter!(names::CONFLICTS_TOTAL, "collection" => collection.to_string()).increment(1);
}
