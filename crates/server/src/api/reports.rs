//! Report generation, upload, listing and deletion.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use fieldreport_core::{
    report::{ReportFilter, ReportRecord},
    storage::client_basename,
    GenerationRequest, GenerationResult, ReportUpload,
};

use super::error::{bad_request, generation_error, report_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for report queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for report queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for listing reports
#[derive(Debug, Deserialize)]
pub struct ListReportsParams {
    pub address: Option<String>,
    pub user_id: Option<i64>,
    pub classification: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListReportsResponse {
    pub reports: Vec<ReportRecord>,
    pub limit: i64,
    pub offset: i64,
}

/// Generate a report through the configured backends.
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerationRequest>,
) -> Result<(StatusCode, Json<GenerationResult>), ApiError> {
    let result = state
        .orchestrator()
        .generate_report(request)
        .await
        .map_err(generation_error)?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Store a finished document sent by the client.
///
/// Fields: `file` (required), `date`, `address`, `classification`,
/// `userId`, `ticketId`.
pub async fn upload_report(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<GenerationResult>), ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut upload = ReportUpload {
        filename: String::new(),
        data: Bytes::new(),
        date: String::new(),
        address: String::new(),
        classification: String::new(),
        user_id: None,
        ticket_id: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Failed to read file: {}", e)))?;
            file = Some((filename, data));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| bad_request(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "date" => upload.date = value,
            "address" => upload.address = value,
            "classification" => upload.classification = value,
            "userId" => upload.user_id = Some(parse_id(&name, &value)?),
            "ticketId" => upload.ticket_id = Some(parse_id(&name, &value)?),
            _ => {}
        }
    }

    let Some((filename, data)) = file else {
        return Err(bad_request("Missing file field"));
    };
    upload.filename = client_basename(&filename).to_string();
    upload.data = data;

    let result = state
        .orchestrator()
        .upload_report(upload)
        .await
        .map_err(generation_error)?;
    Ok((StatusCode::CREATED, Json(result)))
}

fn parse_id(field: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| bad_request(format!("{} must be an integer", field)))
}

/// List report records, newest first.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListReportsParams>,
) -> Result<Json<ListReportsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = ReportFilter::new().with_limit(limit).with_offset(offset);
    if let Some(address) = params.address {
        filter = filter.with_address(address);
    }
    if let Some(user_id) = params.user_id {
        filter = filter.with_user_id(user_id);
    }
    if let Some(classification) = params.classification {
        filter = filter.with_classification(classification);
    }

    let reports = state.reports().list(&filter).map_err(report_error)?;
    Ok(Json(ListReportsResponse {
        reports,
        limit,
        offset,
    }))
}

/// Delete a report record and its stored document and preview.
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<ReportRecord>, ApiError> {
    state
        .orchestrator()
        .delete_report(&filename)
        .await
        .map(Json)
        .map_err(generation_error)
}
