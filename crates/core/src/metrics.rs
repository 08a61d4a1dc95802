//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Document generation (backend attempts, durations, created reports)
//! - Object storage operations
//! - Ticket intake, persistence and backlog notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Generation
// =============================================================================

/// Generation attempts by backend and outcome.
pub static GENERATION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fieldreport_generation_attempts_total",
            "Document generation attempts per backend",
        ),
        &["backend", "result"], // "success", "timeout", "failed"
    )
    .unwrap()
});

/// Generation duration in seconds by backend.
pub static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fieldreport_generation_duration_seconds",
            "Duration of a single generation backend attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["backend"],
    )
    .unwrap()
});

/// Reports recorded, generated or uploaded.
pub static REPORTS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_reports_created_total", "Report records created"),
        &["origin"], // "generated", "uploaded"
    )
    .unwrap()
});

/// Report to ticket link outcomes.
pub static REPORT_LINKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_report_links_total", "Report to ticket linkage outcomes"),
        &["result"], // "explicit", "auto", "no_candidate", "failed"
    )
    .unwrap()
});

// =============================================================================
// Storage
// =============================================================================

/// Object store operations by backend, operation and result.
pub static STORE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_store_operations_total", "Object store operations"),
        &["backend", "operation", "result"],
    )
    .unwrap()
});

// =============================================================================
// Tickets
// =============================================================================

/// Ticket publish outcomes at intake.
pub static TICKETS_QUEUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_tickets_queued_total", "Ticket submissions published"),
        &["result"], // "queued", "failed"
    )
    .unwrap()
});

/// Ticket persistence outcomes in the worker.
pub static TICKETS_PERSISTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_tickets_persisted_total", "Tickets written by the worker"),
        &["result"], // "created", "duplicate", "failed"
    )
    .unwrap()
});

/// Backlog digests by delivery result.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fieldreport_notifications_total", "Backlog digest deliveries"),
        &["result"], // "sent", "failed"
    )
    .unwrap()
});

/// Unassigned tickets seen by the last backlog check.
pub static BACKLOG_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("fieldreport_backlog_size", "Unassigned tickets at the last check").unwrap()
});

/// Queue messages dropped after too many deliveries or an undecodable payload.
pub static QUEUE_DEAD_LETTERS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fieldreport_queue_dead_letters_total",
        "Queue messages dropped without being persisted",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Generation
        Box::new(GENERATION_ATTEMPTS.clone()),
        Box::new(GENERATION_DURATION.clone()),
        Box::new(REPORTS_CREATED.clone()),
        Box::new(REPORT_LINKS.clone()),
        // Storage
        Box::new(STORE_OPERATIONS.clone()),
        // Tickets
        Box::new(TICKETS_QUEUED.clone()),
        Box::new(TICKETS_PERSISTED.clone()),
        Box::new(NOTIFICATIONS.clone()),
        Box::new(BACKLOG_SIZE.clone()),
        Box::new(QUEUE_DEAD_LETTERS.clone()),
    ]
}
