//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the server:
//! - HTTP request metrics (latency, counts)
//! - Ticket counts by status and queue depth (collected dynamically)
//! - Core metrics (generation, storage, queue, notifications)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

use fieldreport_core::ticket::{TicketFilter, TicketStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fieldreport_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fieldreport_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Ticket and Queue Metrics
// =============================================================================

/// Tickets by current status (collected dynamically).
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("fieldreport_tickets_by_status", "Current ticket count by status"),
        &["status"],
    )
    .unwrap()
});

/// Queue messages by state (collected dynamically).
pub static QUEUE_MESSAGES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("fieldreport_queue_messages", "Messages in the ticket queue"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Tickets and queue
    registry
        .register(Box::new(TICKETS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(QUEUE_MESSAGES.clone()))
        .unwrap();

    // Core metrics (generation, storage, queue, notifier)
    for metric in fieldreport_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the live ticket table and queue.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let store = state.ticket_service().store();
    for status in TicketStatus::ALL {
        let filter = TicketFilter::new().with_status(status);
        if let Ok(count) = store.count(&filter) {
            TICKETS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }

    if let Ok(queue) = state.intake().queue().status().await {
        QUEUE_MESSAGES
            .with_label_values(&["ready"])
            .set(queue.ready as i64);
        QUEUE_MESSAGES
            .with_label_values(&["leased"])
            .set(queue.leased as i64);
    }
}

/// Normalize a path for metric labels (replace IDs and object names with placeholders).
pub fn normalize_path(path: &str) -> String {
    let files_regex = regex_lite::Regex::new(r"^(/api/v1/files/[^/]+)/[^/]+$").unwrap();
    let report_regex = regex_lite::Regex::new(r"^/api/v1/reports/[^/]+$").unwrap();
    let library_regex = regex_lite::Regex::new(r"^/api/v1/library/[^/]+$").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = files_regex.replace(path, "$1/{name}");
    let result = if report_regex.is_match(&result) && !result.ends_with("/upload") {
        "/api/v1/reports/{filename}".into()
    } else if library_regex.is_match(&result) && !result.ends_with("/rename") {
        "/api/v1/library/{filename}".into()
    } else {
        result
    };
    // Applied twice: adjacent ids share the separating slash.
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}
