//! Core ticket data types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Ticket lifecycle status.
///
/// `Unassigned -> Assigned -> InProgress -> Completed`, with `Cancelled`
/// reachable from any non-terminal status and a way back to `Unassigned`
/// from `Assigned`/`InProgress`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Unassigned,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Unassigned,
        TicketStatus::Assigned,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Unassigned => "unassigned",
            TicketStatus::Assigned => "assigned",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<TicketStatus> {
        match s {
            "unassigned" => Some(TicketStatus::Unassigned),
            "assigned" => Some(TicketStatus::Assigned),
            "in_progress" => Some(TicketStatus::InProgress),
            "completed" => Some(TicketStatus::Completed),
            "cancelled" => Some(TicketStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }

    /// Whether a ticket in this status may move to `next`.
    ///
    /// Staying in the same non-terminal status is allowed (reassignment).
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (current, next) if *current == next => true,
            (_, Cancelled) => true,
            (Unassigned, Assigned) => true,
            (Assigned, InProgress) | (Assigned, Unassigned) => true,
            (InProgress, Completed) | (InProgress, Unassigned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted client ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: i64,
    /// Idempotency key supplied at intake.
    pub submission_id: String,
    pub date: NaiveDate,
    pub full_name: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub address: String,
    pub description: String,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineer_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineer_name: Option<String>,
    /// Attachment names under the `tickets/` prefix.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queue payload for a submitted ticket.
///
/// Attachments are already stored; `files` holds their final names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketMessage {
    pub submission_id: String,
    pub date: NaiveDate,
    pub full_name: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub address: String,
    pub description: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    pub submitted_at: DateTime<Utc>,
}

/// Result of inserting a queued ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// A new ticket was written.
    Created(Ticket),
    /// A ticket with the same submission id already exists.
    Duplicate(Ticket),
}

impl InsertOutcome {
    pub fn ticket(&self) -> &Ticket {
        match self {
            InsertOutcome::Created(t) | InsertOutcome::Duplicate(t) => t,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }
}
