//! Report records and their links to tickets.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteReportStore;
pub use store::ReportStore;
pub use types::{
    LinkOutcome, NewReport, ReportError, ReportFilter, ReportRecord, DEFAULT_CLASSIFICATION,
};
