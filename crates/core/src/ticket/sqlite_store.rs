//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{InsertOutcome, Ticket, TicketError, TicketFilter, TicketMessage, TicketStatus, TicketStore};

const TICKET_COLUMNS: &str = "id, submission_id, date, full_name, position, contact, address, description, status, engineer_id, engineer_name, files, client_id, completed_at, created_at, updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                submission_id TEXT NOT NULL UNIQUE,
                date TEXT NOT NULL,
                full_name TEXT NOT NULL,
                position TEXT NOT NULL,
                contact TEXT,
                address TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                engineer_id INTEGER,
                engineer_name TEXT,
                files TEXT NOT NULL DEFAULT '[]',
                client_id INTEGER,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_address ON tickets(address);
            CREATE INDEX IF NOT EXISTS idx_tickets_date ON tickets(date);
            "#,
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref address) = filter.address {
            conditions.push("address = ?".to_string());
            params.push(Box::new(address.clone()));
        }

        if let Some(date) = filter.date {
            conditions.push("date = ?".to_string());
            params.push(Box::new(date.format(DATE_FORMAT).to_string()));
        }

        if let Some(ref search) = filter.search {
            let columns = ["full_name", "position", "contact", "address", "description"];
            let pattern = format!("%{}%", search);
            conditions.push(format!(
                "({})",
                columns
                    .iter()
                    .map(|c| format!("{} LIKE ?", c))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            ));
            for _ in columns {
                params.push(Box::new(pattern.clone()));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let date_str: String = row.get(2)?;
        let status_str: String = row.get(8)?;
        let files_json: String = row.get(11)?;
        let completed_at_str: Option<String> = row.get(13)?;
        let created_at_str: String = row.get(14)?;
        let updated_at_str: String = row.get(15)?;

        let created_at = parse_timestamp(&created_at_str);
        let updated_at = parse_timestamp(&updated_at_str);
        let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .unwrap_or_else(|_| created_at.date_naive());

        Ok(Ticket {
            id: row.get(0)?,
            submission_id: row.get(1)?,
            date,
            full_name: row.get(3)?,
            position: row.get(4)?,
            contact: row.get(5)?,
            address: row.get(6)?,
            description: row.get(7)?,
            status: TicketStatus::parse(&status_str).unwrap_or(TicketStatus::Unassigned),
            engineer_id: row.get(9)?,
            engineer_name: row.get(10)?,
            files: serde_json::from_str(&files_json).unwrap_or_default(),
            client_id: row.get(12)?,
            completed_at: completed_at_str.as_deref().map(parse_timestamp),
            created_at,
            updated_at,
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<Ticket>, TicketError> {
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(|e| TicketError::Database(e.to_string()))
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TicketStore for SqliteTicketStore {
    fn insert(&self, message: &TicketMessage) -> Result<InsertOutcome, TicketError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let files_json =
            serde_json::to_string(&message.files).map_err(|e| TicketError::Database(e.to_string()))?;

        let inserted = conn
            .execute(
                "INSERT INTO tickets (submission_id, date, full_name, position, contact, address, description, status, files, client_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(submission_id) DO NOTHING",
                params![
                    message.submission_id,
                    message.date.format(DATE_FORMAT).to_string(),
                    message.full_name,
                    message.position,
                    message.contact,
                    message.address,
                    message.description,
                    TicketStatus::Unassigned.as_str(),
                    files_json,
                    message.client_id,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;

        if inserted == 1 {
            let id = conn.last_insert_rowid();
            let ticket = Self::fetch(&conn, id)?.ok_or(TicketError::NotFound(id))?;
            return Ok(InsertOutcome::Created(ticket));
        }

        let existing = conn
            .query_row(
                &format!("SELECT {} FROM tickets WHERE submission_id = ?", TICKET_COLUMNS),
                params![message.submission_id],
                Self::row_to_ticket,
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;
        Ok(InsertOutcome::Duplicate(existing))
    }

    fn get(&self, id: i64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY id DESC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut tickets = Vec::new();
        for row_result in rows {
            let ticket = row_result.map_err(|e| TicketError::Database(e.to_string()))?;
            tickets.push(ticket);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(count)
    }

    fn update(&self, ticket: &Ticket) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let files_json =
            serde_json::to_string(&ticket.files).map_err(|e| TicketError::Database(e.to_string()))?;

        let updated = conn
            .execute(
                "UPDATE tickets SET status = ?, engineer_id = ?, engineer_name = ?, files = ?, completed_at = ?, updated_at = ? WHERE id = ?",
                params![
                    ticket.status.as_str(),
                    ticket.engineer_id,
                    ticket.engineer_name,
                    files_json,
                    ticket.completed_at.map(|t| t.to_rfc3339()),
                    now.to_rfc3339(),
                    ticket.id,
                ],
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(TicketError::NotFound(ticket.id));
        }

        Ok(Ticket {
            updated_at: now,
            ..ticket.clone()
        })
    }

    fn delete(&self, id: i64) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let ticket = Self::fetch(&conn, id)?.ok_or(TicketError::NotFound(id))?;

        conn.execute("DELETE FROM tickets WHERE id = ?", params![id])
            .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(ticket)
    }

    fn find_latest_open_by_address(&self, address: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {} FROM tickets WHERE address = ? AND status != ? ORDER BY date DESC, id DESC LIMIT 1",
                TICKET_COLUMNS
            ),
            params![address, TicketStatus::Cancelled.as_str()],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(|e| TicketError::Database(e.to_string()))
    }
}
