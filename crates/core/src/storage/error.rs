//! Error types for the storage module.

use thiserror::Error;

use super::Prefix;

/// Errors that can occur while talking to an object backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live object under the key.
    #[error("Object not found: {prefix}{name}")]
    NotFound { prefix: Prefix, name: String },

    /// The object name is not a single safe path segment.
    #[error("Invalid object name: {name:?} ({reason})")]
    InvalidName { name: String, reason: String },

    /// The backend could not be reached or refused the request.
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered with an unexpected error.
    #[error("Storage backend error: {0}")]
    Remote(String),

    /// No free name could be found for a base name.
    #[error("Could not allocate a unique name for {base:?} after {attempts} attempts")]
    NamesExhausted { base: String, attempts: u32 },

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(prefix: Prefix, name: impl Into<String>) -> Self {
        Self::NotFound {
            prefix,
            name: name.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the key simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
