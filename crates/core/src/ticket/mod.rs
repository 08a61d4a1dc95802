//! Client tickets: records, storage and lifecycle.

mod lifecycle;
mod sqlite_store;
mod store;
mod types;

pub use lifecycle::{TicketChange, TicketService};
pub use sqlite_store::SqliteTicketStore;
pub use store::{TicketError, TicketFilter, TicketStore};
pub use types::{InsertOutcome, Ticket, TicketMessage, TicketStatus};
