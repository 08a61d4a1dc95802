//! Keys, metadata and naming helpers for the object store.

use std::fmt;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use super::StoreError;

/// Content type used when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Readable body of a stored object. Dropping it releases the underlying handle.
pub type ObjectStream = Pin<Box<dyn AsyncRead + Send>>;

/// Namespace an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prefix {
    /// Primary generated documents.
    Reports,
    /// Preview renderings of reports.
    Previews,
    /// Generic uploaded files.
    Files,
    /// Ticket attachments.
    Tickets,
}

impl Prefix {
    /// Every prefix, in migration order.
    pub const ALL: [Prefix; 4] = [
        Prefix::Reports,
        Prefix::Previews,
        Prefix::Files,
        Prefix::Tickets,
    ];

    /// Key prefix including the trailing slash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Reports => "reports/",
            Prefix::Previews => "previews/",
            Prefix::Files => "files/",
            Prefix::Tickets => "tickets/",
        }
    }

    /// Directory name used by the local backend.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Prefix::Reports => "reports",
            Prefix::Previews => "previews",
            Prefix::Files => "files",
            Prefix::Tickets => "tickets",
        }
    }

    /// Parse a prefix from its directory name, with or without trailing slash.
    pub fn parse(s: &str) -> Option<Prefix> {
        let s = s.trim_end_matches('/');
        Prefix::ALL.into_iter().find(|p| p.dir_name() == s)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub content_type: String,
    /// Backend checksum tag, when the backend exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Which backend served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectSource {
    Local,
    Remote,
}

/// Reject names that are not a single safe path segment.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::invalid_name(name, "empty"));
    }
    if name == "." || name == ".." {
        return Err(StoreError::invalid_name(name, "relative path component"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(StoreError::invalid_name(name, "contains a path separator"));
    }
    if name.contains('\0') {
        return Err(StoreError::invalid_name(name, "contains NUL"));
    }
    Ok(())
}

/// Split a name into stem and extension (extension keeps its dot).
///
/// `"report.final.pdf"` -> `("report.final", ".pdf")`, `"README"` -> `("README", "")`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

/// Last path segment of a client-supplied filename, with any client-side
/// directories (`/` or `\\`) dropped. Falls back to `"file"`.
pub fn client_basename(original: &str) -> &str {
    original
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("file")
}

/// Candidate name for the given collision counter: `stem(n).ext`.
pub fn numbered_name(name: &str, n: u32) -> String {
    let (stem, ext) = split_extension(name);
    format!("{}({}){}", stem, n, ext)
}

/// Infer a content type from the file extension.
pub fn content_type_for(name: &str) -> &'static str {
    let (_, ext) = split_extension(name);
    match ext.to_ascii_lowercase().as_str() {
        ".pdf" => "application/pdf",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".svg" => "image/svg+xml",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".xls" => "application/vnd.ms-excel",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".txt" => "text/plain; charset=utf-8",
        ".json" => "application/json",
        ".csv" => "text/csv",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
