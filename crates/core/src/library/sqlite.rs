//! SQLite-backed file library store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{FileRecord, FileStore, LibraryError, NewFile};

const FILE_COLUMNS: &str = "id, filename, content_type, size, created_at";

pub struct SqliteFileStore {
    conn: Mutex<Connection>,
}

impl SqliteFileStore {
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        let conn = Connection::open(path).map_err(|e| LibraryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LibraryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LibraryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        let created_at_str: String = row.get(4)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let size: i64 = row.get(3)?;

        Ok(FileRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            content_type: row.get(2)?,
            size: size.max(0) as u64,
            created_at,
        })
    }
}

/// Escape `LIKE` wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl FileStore for SqliteFileStore {
    fn create(&self, file: &NewFile) -> Result<FileRecord, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO files (filename, content_type, size, created_at) VALUES (?, ?, ?, ?)",
            params![
                file.filename,
                file.content_type,
                file.size as i64,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;

        Ok(FileRecord {
            id: conn.last_insert_rowid(),
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            created_at: now,
        })
    }

    fn find(&self, filename: &str) -> Result<Option<FileRecord>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM files WHERE filename = ?", FILE_COLUMNS),
            params![filename],
            Self::row_to_file,
        )
        .optional()
        .map_err(|e| LibraryError::Database(e.to_string()))
    }

    fn list(&self, query: Option<&str>) -> Result<Vec<FileRecord>, LibraryError> {
        let conn = self.conn.lock().unwrap();

        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let (sql, pattern) = match query {
            Some(q) => (
                format!(
                    "SELECT {} FROM files WHERE filename LIKE ? ESCAPE '\\' ORDER BY filename",
                    FILE_COLUMNS
                ),
                Some(like_pattern(q)),
            ),
            None => (
                format!("SELECT {} FROM files ORDER BY filename", FILE_COLUMNS),
                None,
            ),
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LibraryError::Database(e.to_string()))?;
        let rows = match &pattern {
            Some(p) => stmt.query_map(params![p], Self::row_to_file),
            None => stmt.query_map([], Self::row_to_file),
        }
        .map_err(|e| LibraryError::Database(e.to_string()))?;

        let mut files = Vec::new();
        for row_result in rows {
            files.push(row_result.map_err(|e| LibraryError::Database(e.to_string()))?);
        }
        Ok(files)
    }

    fn rename(&self, from: &str, to: &str) -> Result<bool, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE files SET filename = ? WHERE filename = ?",
                params![to, from],
            )
            .map_err(|e| LibraryError::Database(e.to_string()))?;
        Ok(updated > 0)
    }

    fn delete(&self, filename: &str) -> Result<bool, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn
            .execute("DELETE FROM files WHERE filename = ?", params![filename])
            .map_err(|e| LibraryError::Database(e.to_string()))?;
        Ok(removed > 0)
    }
}
