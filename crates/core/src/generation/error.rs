//! Error types for document generation.

use thiserror::Error;

use crate::report::ReportError;
use crate::storage::StoreError;
use crate::ticket::TicketError;

/// Failure of a single backend attempt. Never shown to users directly.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Generation timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation rejected: {0}")]
    Rejected(String),

    #[error("Invalid generator output: {0}")]
    InvalidOutput(String),

    #[error("Failed to encode request: {0}")]
    Request(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the document orchestrator.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Malformed request. Nothing was attempted.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No generation backends configured")]
    NoBackends,

    /// Every backend failed; no artifact was stored.
    #[error("All {attempts} generation backends failed, last error: {last_error}")]
    AllBackendsFailed { attempts: usize, last_error: String },

    /// Artifacts were produced but could not be stored or recorded.
    #[error("Failed to persist report: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl GenerationError {
    /// Message safe to show to the person who made the request.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Validation(msg) => msg.clone(),
            GenerationError::NoBackends | GenerationError::AllBackendsFailed { .. } => {
                "Document generation is currently unavailable, please try again later".to_string()
            }
            GenerationError::Persistence(_) => "Failed to save the generated report".to_string(),
            GenerationError::NotFound(what) => format!("{} not found", what),
        }
    }
}

impl From<ReportError> for GenerationError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::NotFound(id) => GenerationError::NotFound(format!("Report {}", id)),
            ReportError::Database(msg) => GenerationError::Persistence(msg),
        }
    }
}

impl From<TicketError> for GenerationError {
    fn from(e: TicketError) -> Self {
        match e {
            TicketError::NotFound(id) => GenerationError::NotFound(format!("Ticket {}", id)),
            other => GenerationError::Persistence(other.to_string()),
        }
    }
}

impl From<StoreError> for GenerationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidName { name, reason } => {
                GenerationError::Validation(format!("invalid file name {:?}: {}", name, reason))
            }
            StoreError::NotFound { prefix, name } => {
                GenerationError::NotFound(format!("{}{}", prefix, name))
            }
            other => GenerationError::Persistence(other.to_string()),
        }
    }
}
