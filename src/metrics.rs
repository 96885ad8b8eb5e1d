/// Metrics for the CampusConnect workflow service
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Workflow operation outcomes
/// - Notification fan-out results
/// - Event participation
/// - HTTP request counts and latencies

use crate::error::{WorkflowError, WorkflowResult};
use lazy_static::lazy_static;
use std::time::Instant;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, Gauge, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== Workflow Metrics ==========

    /// Workflow operations by operation name and outcome
    pub static ref WORKFLOW_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "workflow_operations_total",
        "Total number of workflow operations",
        &["operation", "outcome"]
    )
    .unwrap();

    /// Notification records by type and status (delivered, failed, dispatch_error)
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notifications_total",
        "Total number of notification records by outcome",
        &["type", "status"]
    )
    .unwrap();

    /// Successful event joins
    pub static ref PARTICIPANTS_JOINED_TOTAL: IntCounter = register_int_counter!(
        "participants_joined_total",
        "Total number of successful event joins"
    )
    .unwrap();

    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    /// Process uptime
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Service uptime in seconds"
    )
    .unwrap();

    static ref STARTED_AT: Instant = Instant::now();
}

/// Mark process start. Uptime is measured from the first call.
pub fn init() {
    lazy_static::initialize(&STARTED_AT);
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> WorkflowResult<String> {
    UPTIME_SECONDS.set(STARTED_AT.elapsed().as_secs_f64());

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| WorkflowError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| WorkflowError::Internal(format!("Metrics are not UTF-8: {}", e)))
}

/// Outcome label for a workflow result
pub fn outcome_label<T>(result: &WorkflowResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(WorkflowError::NotFound(_)) => "not_found",
        Err(WorkflowError::Forbidden(_)) => "forbidden",
        Err(WorkflowError::Conflict(_)) => "conflict",
        Err(WorkflowError::Validation(_)) => "invalid",
        Err(WorkflowError::Unavailable(_)) | Err(WorkflowError::DispatchUnavailable(_)) => {
            "unavailable"
        }
        Err(WorkflowError::Internal(_)) => "error",
    }
}

/// Record a finished workflow operation
pub fn record_operation<T>(operation: &str, result: &WorkflowResult<T>) {
    WORKFLOW_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome_label(result)])
        .inc();
}

/// Record the result of one fan-out
pub fn record_notifications(kind: &str, delivered: usize, failed: usize) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[kind, "delivered"])
        .inc_by(delivered as u64);
    if failed > 0 {
        NOTIFICATIONS_TOTAL
            .with_label_values(&[kind, "failed"])
            .inc_by(failed as u64);
    }
}

/// Record a fan-out that failed as a whole
pub fn record_dispatch_failure(kind: &str) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[kind, "dispatch_error"])
        .inc();
}

/// Record a successful event join
pub fn record_participant_joined() {
    PARTICIPANTS_JOINED_TOTAL.inc();
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}
