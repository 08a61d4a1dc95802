use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use fieldreport_core::{storage::StorageMode, SanitizedConfig};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: StorageMode,
    pub storage_backend: String,
    pub generation_backends: Vec<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.objects().mode(),
        storage_backend: state.objects().backend_name().to_string(),
        generation_backends: state.orchestrator().backend_names(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}
