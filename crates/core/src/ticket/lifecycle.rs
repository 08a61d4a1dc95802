//! Ticket mutations with their storage side effects.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::{Ticket, TicketError, TicketStatus, TicketStore};
use crate::notify::BacklogNotifier;
use crate::storage::{ObjectStore, Prefix};

/// Requested change to a ticket. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketChange {
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub engineer_id: Option<i64>,
    #[serde(default)]
    pub engineer_name: Option<String>,
}

/// Applies status transitions, attachment cleanup and backlog notification.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    objects: Arc<ObjectStore>,
    notifier: Option<Arc<BacklogNotifier>>,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>, objects: Arc<ObjectStore>) -> Self {
        Self {
            store,
            objects,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<BacklogNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Apply a change and return the saved ticket.
    ///
    /// Moving to `Unassigned` clears the assignee. Moving to `Completed`
    /// stamps `completed_at` and removes every attachment from storage once
    /// the record is saved.
    pub async fn update_ticket(&self, id: i64, change: TicketChange) -> Result<Ticket, TicketError> {
        let mut ticket = self.store.get(id)?.ok_or(TicketError::NotFound(id))?;
        let previous = ticket.status;

        if let Some(engineer_id) = change.engineer_id {
            ticket.engineer_id = Some(engineer_id);
        }
        if let Some(engineer_name) = change.engineer_name {
            ticket.engineer_name = Some(engineer_name);
        }

        let mut released = Vec::new();
        if let Some(next) = change.status {
            if !previous.can_transition_to(next) {
                return Err(TicketError::InvalidTransition {
                    ticket_id: id,
                    from: previous,
                    to: next,
                });
            }
            ticket.status = next;

            match next {
                TicketStatus::Unassigned => {
                    ticket.engineer_id = None;
                    ticket.engineer_name = None;
                }
                TicketStatus::Completed => {
                    ticket.completed_at = Some(Utc::now());
                    released = std::mem::take(&mut ticket.files);
                }
                _ => {}
            }
        }

        let saved = self.store.update(&ticket)?;
        if previous != saved.status {
            info!(ticket_id = id, from = %previous, to = %saved.status, "Ticket status changed");
        }

        self.purge_attachments(id, &released).await;
        self.notify();
        Ok(saved)
    }

    /// Delete a ticket together with its attachments.
    pub async fn delete_ticket(&self, id: i64) -> Result<Ticket, TicketError> {
        let ticket = self.store.delete(id)?;
        info!(ticket_id = id, files = ticket.files.len(), "Ticket deleted");

        self.purge_attachments(id, &ticket.files).await;
        self.notify();
        Ok(ticket)
    }

    async fn purge_attachments(&self, ticket_id: i64, files: &[String]) {
        for name in files {
            if let Err(e) = self.objects.purge(Prefix::Tickets, name).await {
                warn!(ticket_id, file = %name, error = %e, "Failed to remove ticket attachment");
            }
        }
    }

    fn notify(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.trigger();
        }
    }
}
