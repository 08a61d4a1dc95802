//! Request and artifact types for document generation.

use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::report::ReportRecord;

/// One line of the inspection checklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub task: String,
    #[serde(default)]
    pub done: bool,
}

/// What to render. The JSON field names are the ones generation services
/// expect.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub date: String,
    pub address: String,
    #[serde(default)]
    pub machine_name: String,
    #[serde(default)]
    pub machine_number: String,
    #[serde(default)]
    pub inventory_number: String,
    #[serde(default)]
    pub classification: String,
    #[serde(rename = "customClass", default)]
    pub custom_class: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub recommendations: String,
    #[serde(default)]
    pub defects: String,
    #[serde(rename = "additionalWorks", default)]
    pub additional_works: String,
    #[serde(default)]
    pub comments: String,
    #[serde(rename = "checklistItems", default)]
    pub checklist_items: Vec<ChecklistItem>,
    /// Photo references, passed through to the generator untouched.
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Ticket to link the report to. Without it the report is linked by address.
    #[serde(rename = "ticketId", default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i64>,
}

/// Where the bytes of a generated artifact are.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactSource {
    /// Returned inline by the backend.
    Bytes(Bytes),
    /// Written by the backend into the shared staging directory.
    Staged(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// File name proposed by the backend, used as the base for the stored name.
    pub name: String,
    pub source: ArtifactSource,
}

impl Artifact {
    pub fn inline(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::Bytes(data.into()),
        }
    }

    pub fn staged(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ArtifactSource::Staged(path.into()),
        }
    }
}

/// Output of a successful backend attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifacts {
    pub primary: Artifact,
    pub preview: Option<Artifact>,
}

/// Outcome returned to the caller once the report is recorded.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub report: ReportRecord,
    pub primary_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_name: Option<String>,
    /// Backend that produced the document, or `"upload"`.
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_ticket: Option<i64>,
    pub success: bool,
}
