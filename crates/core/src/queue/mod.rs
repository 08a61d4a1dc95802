//! Asynchronous ticket intake.
//!
//! Submissions are accepted by [`TicketIntake`], which stores attachments and
//! publishes a message to a durable queue. [`TicketWorker`] consumes the queue
//! and inserts ticket records.

mod intake;
mod sqlite;
mod types;
mod worker;

pub use intake::{Attachment, IntakeError, TicketIntake, TicketReceipt, TicketSubmission};
pub use sqlite::SqliteTicketQueue;
pub use types::{Delivery, QueueError, QueueStatus, TicketQueue};
pub use worker::{TicketWorker, WorkOutcome};
