//! Report record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification stored when the request does not carry one.
pub const DEFAULT_CLASSIFICATION: &str = "Не указано";

/// A persisted report pointing at its stored artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    pub id: i64,
    /// Name of the primary document under `reports/`.
    pub filename: String,
    /// Name of the preview under `previews/`, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_name: Option<String>,
    pub date: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub classification: String,
    pub created_at: DateTime<Utc>,
}

/// Values for a new report record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub filename: String,
    pub preview_name: Option<String>,
    pub date: String,
    pub address: String,
    pub user_id: Option<i64>,
    pub classification: String,
}

/// Result of linking a report to a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
}

/// Filter for querying reports.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub address: Option<String>,
    pub user_id: Option<i64>,
    pub classification: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ReportFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}
