//! Testing utilities and mock implementations.
//!
//! This module provides in-memory or scripted implementations of every
//! external collaborator (object storage, generation services, the queue,
//! the notification channel), so the whole report and ticket flow can be
//! exercised without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldreport_core::testing::{fixtures, MemoryObjectBackend, MockGenerationBackend};
//!
//! let objects = Arc::new(MemoryObjectBackend::default());
//! let grpc = Arc::new(MockGenerationBackend::hanging("grpc"));
//! let http = Arc::new(MockGenerationBackend::succeeding("http", "report.pdf"));
//!
//! // Build an orchestrator with [grpc, http] and generate
//! let result = orchestrator.generate_report(fixtures::generation_request("ул. Мира, 1")).await?;
//! assert_eq!(result.backend, "http");
//! ```

mod memory_store;
mod mock_generation;
mod mock_notifier;
mod mock_queue;

pub use memory_store::MemoryObjectBackend;
pub use mock_generation::{MockBehavior, MockGenerationBackend};
pub use mock_notifier::MockNotificationSender;
pub use mock_queue::MockTicketQueue;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{NaiveDate, Utc};

    use crate::generation::{ChecklistItem, GenerationRequest};
    use crate::ticket::{Ticket, TicketMessage, TicketStatus};

    fn fixture_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap_or_default()
    }

    /// Create a queued ticket message with reasonable defaults.
    pub fn ticket_message(submission_id: &str, address: &str) -> TicketMessage {
        TicketMessage {
            submission_id: submission_id.to_string(),
            date: fixture_date(),
            full_name: "Иванова А. С.".to_string(),
            position: "Администратор".to_string(),
            contact: Some("+7 900 000-00-00".to_string()),
            address: address.to_string(),
            description: "Не работает освещение в холле".to_string(),
            files: Vec::new(),
            client_id: None,
            submitted_at: Utc::now(),
        }
    }

    /// Create an unassigned ticket as if read back from the store.
    pub fn ticket(submission_id: &str, address: &str) -> Ticket {
        let message = ticket_message(submission_id, address);
        let now = Utc::now();
        Ticket {
            id: 1,
            submission_id: message.submission_id,
            date: message.date,
            full_name: message.full_name,
            position: message.position,
            contact: message.contact,
            address: message.address,
            description: message.description,
            status: TicketStatus::Unassigned,
            engineer_id: None,
            engineer_name: None,
            files: message.files,
            client_id: message.client_id,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a generation request for an inspection at `address`.
    pub fn generation_request(address: &str) -> GenerationRequest {
        GenerationRequest {
            date: "2025-01-15".to_string(),
            address: address.to_string(),
            machine_name: "Лифт пассажирский".to_string(),
            machine_number: "L-17".to_string(),
            inventory_number: "000123".to_string(),
            classification: "ТО".to_string(),
            recommendations: "Заменить трос".to_string(),
            checklist_items: vec![
                ChecklistItem {
                    task: "Осмотр кабины".to_string(),
                    done: true,
                },
                ChecklistItem {
                    task: "Проверка тормозов".to_string(),
                    done: false,
                },
            ],
            first_name: "Пётр".to_string(),
            last_name: "Сидоров".to_string(),
            ..Default::default()
        }
    }
}
