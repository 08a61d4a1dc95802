//! SQLite-backed report store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{LinkOutcome, NewReport, ReportError, ReportFilter, ReportRecord, ReportStore};

const REPORT_COLUMNS: &str =
    "r.id, r.filename, r.preview_name, r.date, r.address, r.user_id, r.classification, r.created_at";

pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    pub fn new(path: &Path) -> Result<Self, ReportError> {
        let conn = Connection::open(path).map_err(|e| ReportError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, ReportError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ReportError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ReportError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                preview_name TEXT,
                date TEXT NOT NULL,
                address TEXT NOT NULL,
                user_id INTEGER,
                classification TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ticket_reports (
                ticket_id INTEGER NOT NULL,
                report_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (ticket_id, report_id)
            );

            CREATE INDEX IF NOT EXISTS idx_reports_address ON reports(address);
            CREATE INDEX IF NOT EXISTS idx_ticket_reports_report ON ticket_reports(report_id);
            "#,
        )
        .map_err(|e| ReportError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &ReportFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref address) = filter.address {
            conditions.push("r.address = ?");
            params.push(Box::new(address.clone()));
        }

        if let Some(user_id) = filter.user_id {
            conditions.push("r.user_id = ?");
            params.push(Box::new(user_id));
        }

        if let Some(ref classification) = filter.classification {
            conditions.push("r.classification = ?");
            params.push(Box::new(classification.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<ReportRecord> {
        let created_at_str: String = row.get(7)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ReportRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            preview_name: row.get(2)?,
            date: row.get(3)?,
            address: row.get(4)?,
            user_id: row.get(5)?,
            classification: row.get(6)?,
            created_at,
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<ReportRecord>, ReportError> {
        conn.query_row(
            &format!("SELECT {} FROM reports r WHERE r.id = ?", REPORT_COLUMNS),
            params![id],
            Self::row_to_report,
        )
        .optional()
        .map_err(|e| ReportError::Database(e.to_string()))
    }

    fn collect(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ReportRecord>, ReportError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ReportError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_report)
            .map_err(|e| ReportError::Database(e.to_string()))?;

        let mut reports = Vec::new();
        for row_result in rows {
            reports.push(row_result.map_err(|e| ReportError::Database(e.to_string()))?);
        }
        Ok(reports)
    }
}

impl ReportStore for SqliteReportStore {
    fn create(&self, report: &NewReport) -> Result<ReportRecord, ReportError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO reports (filename, preview_name, date, address, user_id, classification, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                report.filename,
                report.preview_name,
                report.date,
                report.address,
                report.user_id,
                report.classification,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| ReportError::Database(e.to_string()))?;

        Ok(ReportRecord {
            id: conn.last_insert_rowid(),
            filename: report.filename.clone(),
            preview_name: report.preview_name.clone(),
            date: report.date.clone(),
            address: report.address.clone(),
            user_id: report.user_id,
            classification: report.classification.clone(),
            created_at: now,
        })
    }

    fn get(&self, id: i64) -> Result<Option<ReportRecord>, ReportError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, id)
    }

    fn find_by_filename(&self, filename: &str) -> Result<Option<ReportRecord>, ReportError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM reports r WHERE r.filename = ?", REPORT_COLUMNS),
            params![filename],
            Self::row_to_report,
        )
        .optional()
        .map_err(|e| ReportError::Database(e.to_string()))
    }

    fn list(&self, filter: &ReportFilter) -> Result<Vec<ReportRecord>, ReportError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM reports r {} ORDER BY r.id DESC LIMIT ? OFFSET ?",
            REPORT_COLUMNS, where_clause
        );

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        Self::collect(&conn, &sql, &param_refs)
    }

    fn delete(&self, id: i64) -> Result<ReportRecord, ReportError> {
        let mut conn = self.conn.lock().unwrap();

        let report = Self::fetch(&conn, id)?.ok_or_else(|| ReportError::NotFound(id.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| ReportError::Database(e.to_string()))?;
        tx.execute("DELETE FROM ticket_reports WHERE report_id = ?", params![id])
            .map_err(|e| ReportError::Database(e.to_string()))?;
        tx.execute("DELETE FROM reports WHERE id = ?", params![id])
            .map_err(|e| ReportError::Database(e.to_string()))?;
        tx.commit()
            .map_err(|e| ReportError::Database(e.to_string()))?;

        Ok(report)
    }

    fn link_ticket(&self, report_id: i64, ticket_id: i64) -> Result<LinkOutcome, ReportError> {
        let conn = self.conn.lock().unwrap();

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO ticket_reports (ticket_id, report_id, created_at) VALUES (?, ?, ?)",
                params![ticket_id, report_id, Utc::now().to_rfc3339()],
            )
            .map_err(|e| ReportError::Database(e.to_string()))?;

        Ok(if inserted == 1 {
            LinkOutcome::Linked
        } else {
            LinkOutcome::AlreadyLinked
        })
    }

    fn unlink_ticket(&self, report_id: i64, ticket_id: i64) -> Result<bool, ReportError> {
        let conn = self.conn.lock().unwrap();

        let removed = conn
            .execute(
                "DELETE FROM ticket_reports WHERE ticket_id = ? AND report_id = ?",
                params![ticket_id, report_id],
            )
            .map_err(|e| ReportError::Database(e.to_string()))?;

        Ok(removed > 0)
    }

    fn reports_for_ticket(&self, ticket_id: i64) -> Result<Vec<ReportRecord>, ReportError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM reports r JOIN ticket_reports tr ON tr.report_id = r.id WHERE tr.ticket_id = ? ORDER BY tr.created_at DESC, r.id DESC",
            REPORT_COLUMNS
        );
        Self::collect(&conn, &sql, &[&ticket_id as &dyn rusqlite::ToSql])
    }
}
