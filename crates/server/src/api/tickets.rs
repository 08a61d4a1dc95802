//! Ticket API handlers.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use fieldreport_core::{
    queue::{Attachment, TicketReceipt, TicketSubmission},
    report::{LinkOutcome, ReportRecord},
    ticket::{TicketChange, TicketError, TicketFilter},
    Ticket, TicketStatus,
};

use super::error::{bad_request, generation_error, intake_error, report_error, ticket_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// JSON body for submitting a ticket without attachments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketBody {
    pub submission_id: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: String,
    pub contact: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    pub client_id: Option<i64>,
}

impl From<CreateTicketBody> for TicketSubmission {
    fn from(body: CreateTicketBody) -> Self {
        Self {
            submission_id: body.submission_id,
            date: body.date,
            full_name: body.full_name,
            position: body.position,
            contact: body.contact,
            address: body.address,
            description: body.description,
            client_id: body.client_id,
            attachments: Vec::new(),
        }
    }
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    pub status: Option<String>,
    pub address: Option<String>,
    pub date: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct LinkReportBody {
    pub report_id: i64,
}

#[derive(Debug, Serialize)]
pub struct LinkReportResponse {
    pub result: LinkOutcome,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a ticket as JSON or as a multipart form with attachments.
///
/// The ticket is queued, not stored: the response carries the submission id
/// and attachment names, and the record appears once the worker picks it up.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<TicketReceipt>), ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let submission = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        read_submission_form(multipart).await?
    } else {
        let Json(body) = Json::<CreateTicketBody>::from_request(request, &())
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        TicketSubmission::from(body)
    };

    let receipt = state
        .intake()
        .submit(submission)
        .await
        .map_err(intake_error)?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

async fn read_submission_form(mut multipart: Multipart) -> Result<TicketSubmission, ApiError> {
    let mut submission = TicketSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "files" || name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Failed to read attachment: {}", e)))?;
            submission.attachments.push(Attachment {
                filename,
                content_type,
                data,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| bad_request(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "submissionId" => submission.submission_id = Some(value),
            "date" => {
                let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .map_err(|_| bad_request("date must be YYYY-MM-DD"))?;
                submission.date = Some(date);
            }
            "fullName" => submission.full_name = value,
            "position" => submission.position = value,
            "contact" => submission.contact = Some(value).filter(|v| !v.trim().is_empty()),
            "address" => submission.address = value,
            "description" => submission.description = value,
            "clientId" => {
                let id = value
                    .trim()
                    .parse()
                    .map_err(|_| bad_request("clientId must be an integer"))?;
                submission.client_id = Some(id);
            }
            _ => {}
        }
    }

    Ok(submission)
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, ApiError> {
    match state.ticket_service().store().get(id) {
        Ok(Some(ticket)) => Ok(Json(ticket)),
        Ok(None) => Err(ticket_error(TicketError::NotFound(id))),
        Err(e) => Err(ticket_error(e)),
    }
}

/// List tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        let status = TicketStatus::parse(status)
            .ok_or_else(|| bad_request(format!("Unknown status: {}", status)))?;
        filter = filter.with_status(status);
    }
    if let Some(address) = params.address {
        filter = filter.with_address(address);
    }
    if let Some(date) = params.date {
        filter = filter.with_date(date);
    }
    if let Some(search) = params.search.filter(|s| !s.trim().is_empty()) {
        filter = filter.with_search(search);
    }

    let store = state.ticket_service().store();
    let tickets = store.list(&filter).map_err(ticket_error)?;
    let total = store.count(&filter).map_err(ticket_error)?;

    Ok(Json(ListTicketsResponse {
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Change status or assignment.
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(change): Json<TicketChange>,
) -> Result<Json<Ticket>, ApiError> {
    state
        .ticket_service()
        .update_ticket(id, change)
        .await
        .map(Json)
        .map_err(ticket_error)
}

/// Delete a ticket and its attachments.
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, ApiError> {
    state
        .ticket_service()
        .delete_ticket(id)
        .await
        .map(Json)
        .map_err(ticket_error)
}

/// Reports linked to a ticket.
pub async fn ticket_reports(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ReportRecord>>, ApiError> {
    if state
        .ticket_service()
        .store()
        .get(id)
        .map_err(ticket_error)?
        .is_none()
    {
        return Err(ticket_error(TicketError::NotFound(id)));
    }
    state
        .reports()
        .reports_for_ticket(id)
        .map(Json)
        .map_err(report_error)
}

pub async fn link_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<LinkReportBody>,
) -> Result<Json<LinkReportResponse>, ApiError> {
    let result = state
        .orchestrator()
        .link_report(body.report_id, id)
        .map_err(generation_error)?;
    Ok(Json(LinkReportResponse { result }))
}

pub async fn unlink_report(
    State(state): State<Arc<AppState>>,
    Path((id, report_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .orchestrator()
        .unlink_report(report_id, id)
        .map_err(generation_error)?;
    Ok(StatusCode::NO_CONTENT)
}
