//! Shared file library handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use fieldreport_core::FileRecord;

use super::error::{bad_request, library_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFileBody {
    pub old_name: String,
    /// New name without the extension.
    pub new_name: String,
}

/// List library files, optionally narrowed by a name search.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListFilesParams>,
) -> Result<Json<ListFilesResponse>, ApiError> {
    let files = state
        .library()
        .list(params.query.as_deref())
        .map_err(library_error)?;
    Ok(Json(ListFilesResponse { files }))
}

/// Add every `file` part of a multipart body to the library.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ListFilesResponse>), ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if !matches!(field.name(), Some("file" | "files")) {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file: {}", e)))?;

        let record = state
            .library()
            .upload(&filename, data, content_type.as_deref())
            .await
            .map_err(library_error)?;
        files.push(record);
    }

    if files.is_empty() {
        return Err(bad_request("Missing file field"));
    }
    Ok((StatusCode::CREATED, Json(ListFilesResponse { files })))
}

/// Rename a file, keeping its extension.
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenameFileBody>,
) -> Result<Json<FileRecord>, ApiError> {
    state
        .library()
        .rename(&body.old_name, &body.new_name)
        .await
        .map(Json)
        .map_err(library_error)
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .library()
        .delete(&filename)
        .await
        .map_err(library_error)?;
    Ok(StatusCode::NO_CONTENT)
}
