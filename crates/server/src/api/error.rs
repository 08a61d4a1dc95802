//! Error responses shared by the API handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;

use fieldreport_core::{
    queue::IntakeError, report::ReportError, ticket::TicketError, GenerationError, LibraryError,
    StoreError,
};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// What every failing handler returns.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    error!(error = %e, "Request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub fn generation_error(e: GenerationError) -> ApiError {
    let status = match &e {
        GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
        GenerationError::NotFound(_) => StatusCode::NOT_FOUND,
        GenerationError::NoBackends => StatusCode::SERVICE_UNAVAILABLE,
        GenerationError::AllBackendsFailed { .. } => StatusCode::BAD_GATEWAY,
        GenerationError::Persistence(_) => {
            error!(error = %e, "Report persistence failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.user_message())
}

pub fn intake_error(e: IntakeError) -> ApiError {
    let status = match &e {
        IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
        IntakeError::Storage { .. } => {
            error!(error = %e, "Attachment upload failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        IntakeError::QueuePublish(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, e.user_message())
}

pub fn ticket_error(e: TicketError) -> ApiError {
    match e {
        TicketError::NotFound(id) => {
            api_error(StatusCode::NOT_FOUND, format!("Ticket not found: {}", id))
        }
        TicketError::InvalidTransition { .. } => api_error(StatusCode::CONFLICT, e.to_string()),
        TicketError::Database(_) => internal(e),
    }
}

pub fn report_error(e: ReportError) -> ApiError {
    match e {
        ReportError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        ReportError::Database(_) => internal(e),
    }
}

pub fn library_error(e: LibraryError) -> ApiError {
    match e {
        LibraryError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        LibraryError::AlreadyExists(_) => api_error(StatusCode::CONFLICT, e.to_string()),
        LibraryError::InvalidName(_) => bad_request(e.to_string()),
        LibraryError::Storage(e) => store_error(e),
        LibraryError::Database(_) => internal(e),
    }
}

pub fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::InvalidName { .. } => bad_request(e.to_string()),
        StoreError::BackendUnavailable(_) => {
            error!(error = %e, "Object storage unavailable");
            api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        _ => internal(e),
    }
}
