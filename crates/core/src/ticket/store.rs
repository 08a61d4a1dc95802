//! Ticket storage trait and types.

use std::fmt;

use chrono::NaiveDate;

use crate::ticket::{InsertOutcome, Ticket, TicketMessage, TicketStatus};

/// Error type for ticket operations.
#[derive(Debug)]
pub enum TicketError {
    /// Ticket not found.
    NotFound(i64),
    /// The requested status change is not allowed.
    InvalidTransition {
        ticket_id: i64,
        from: TicketStatus,
        to: TicketStatus,
    },
    /// Database error.
    Database(String),
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketError::NotFound(id) => write!(f, "Ticket not found: {}", id),
            TicketError::InvalidTransition {
                ticket_id,
                from,
                to,
            } => write!(
                f,
                "Cannot move ticket {} from {} to {}",
                ticket_id, from, to
            ),
            TicketError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TicketError {}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by status.
    pub status: Option<TicketStatus>,
    /// Exact address match.
    pub address: Option<String>,
    /// Exact date match.
    pub date: Option<NaiveDate>,
    /// Substring search over name, position, contact, address and description.
    pub search: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for ticket storage backends.
pub trait TicketStore: Send + Sync {
    /// Insert a queued ticket as `Unassigned`. Idempotent on `submission_id`.
    fn insert(&self, message: &TicketMessage) -> Result<InsertOutcome, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: i64) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, newest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter (limit and offset are ignored).
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Persist the mutable fields of a ticket and bump `updated_at`.
    fn update(&self, ticket: &Ticket) -> Result<Ticket, TicketError>;

    /// Permanently delete a ticket. Returns the deleted ticket.
    fn delete(&self, id: i64) -> Result<Ticket, TicketError>;

    /// Most recent ticket at `address` that is not cancelled.
    fn find_latest_open_by_address(&self, address: &str) -> Result<Option<Ticket>, TicketError>;
}
