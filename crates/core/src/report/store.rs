use super::{LinkOutcome, NewReport, ReportError, ReportFilter, ReportRecord};

/// Trait for report storage backends, including report to ticket links.
pub trait ReportStore: Send + Sync {
    fn create(&self, report: &NewReport) -> Result<ReportRecord, ReportError>;

    fn get(&self, id: i64) -> Result<Option<ReportRecord>, ReportError>;

    fn find_by_filename(&self, filename: &str) -> Result<Option<ReportRecord>, ReportError>;

    /// Newest first.
    fn list(&self, filter: &ReportFilter) -> Result<Vec<ReportRecord>, ReportError>;

    /// Delete a report and its ticket links. Returns the deleted record.
    fn delete(&self, id: i64) -> Result<ReportRecord, ReportError>;

    /// Link a report to a ticket. Linking an existing pair is a no-op.
    fn link_ticket(&self, report_id: i64, ticket_id: i64) -> Result<LinkOutcome, ReportError>;

    /// Remove a link. Returns false if it did not exist.
    fn unlink_ticket(&self, report_id: i64, ticket_id: i64) -> Result<bool, ReportError>;

    /// Reports linked to a ticket, newest link first.
    fn reports_for_ticket(&self, ticket_id: i64) -> Result<Vec<ReportRecord>, ReportError>;
}
