//! Queue and notifier operations.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use fieldreport_core::{queue::QueueStatus, NotifyOutcome};

use super::error::{api_error, ApiError};
use crate::state::AppState;

/// Ready and leased message counts for the intake queue.
pub async fn queue_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueStatus>, ApiError> {
    state
        .intake()
        .queue()
        .status()
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// Run a backlog check now and report what it did.
pub async fn notify_backlog(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NotifyOutcome>, ApiError> {
    state
        .notifier()
        .check()
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
