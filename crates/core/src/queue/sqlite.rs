//! SQLite-backed durable ticket queue.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error};

use super::{Delivery, QueueError, QueueStatus, TicketQueue};
use crate::metrics::QUEUE_DEAD_LETTERS;
use crate::ticket::TicketMessage;

/// Queue table shared by any number of named queues.
///
/// `visible_at` is a unix timestamp in milliseconds: a received message is
/// pushed `lease` into the future, acking deletes the row, nacking makes it
/// visible immediately.
pub struct SqliteTicketQueue {
    conn: Mutex<Connection>,
    name: String,
    lease: Duration,
    max_deliveries: u32,
}

impl SqliteTicketQueue {
    /// Open (or create) a queue database file.
    pub fn new(
        path: &Path,
        name: impl Into<String>,
        lease: Duration,
        max_deliveries: u32,
    ) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(|e| QueueError::Database(e.to_string()))?;
        Self::with_connection(conn, name.into(), lease, max_deliveries)
    }

    /// Create an in-memory queue (useful for testing).
    pub fn in_memory(name: impl Into<String>) -> Result<Self, QueueError> {
        let conn =
            Connection::open_in_memory().map_err(|e| QueueError::Database(e.to_string()))?;
        Self::with_connection(conn, name.into(), Duration::from_secs(300), 5)
    }

    fn with_connection(
        conn: Connection,
        name: String,
        lease: Duration,
        max_deliveries: u32,
    ) -> Result<Self, QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                visible_at INTEGER NOT NULL,
                enqueued_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_messages_visible
                ON queue_messages(queue, visible_at, id);
            "#,
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            name,
            lease,
            max_deliveries,
        })
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries;
        self
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn drop_message(conn: &Connection, id: i64) -> Result<(), QueueError> {
        conn.execute("DELETE FROM queue_messages WHERE id = ?", params![id])
            .map_err(|e| QueueError::Database(e.to_string()))?;
        QUEUE_DEAD_LETTERS.inc();
        Ok(())
    }
}

#[async_trait]
impl TicketQueue for SqliteTicketQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, message: &TicketMessage) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(message).map_err(|e| QueueError::Encode(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO queue_messages (queue, payload, attempts, visible_at, enqueued_at)
            VALUES (?, ?, 0, ?, ?)
            "#,
            params![
                self.name,
                payload,
                Self::now_millis(),
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;

        debug!(queue = %self.name, submission_id = %message.submission_id, "Message published");
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| QueueError::Database(e.to_string()))?;

        loop {
            let now = Self::now_millis();
            let row: Option<(i64, String, u32)> = tx
                .query_row(
                    r#"
                    SELECT id, payload, attempts FROM queue_messages
                    WHERE queue = ? AND visible_at <= ?
                    ORDER BY id ASC LIMIT 1
                    "#,
                    params![self.name, now],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(|e| QueueError::Database(e.to_string()))?;

            let Some((id, payload, attempts)) = row else {
                tx.commit().map_err(|e| QueueError::Database(e.to_string()))?;
                return Ok(None);
            };

            if attempts >= self.max_deliveries {
                error!(
                    queue = %self.name,
                    message_id = id,
                    attempts,
                    "Message exceeded delivery limit, dropping"
                );
                Self::drop_message(&tx, id)?;
                continue;
            }

            let message: TicketMessage = match serde_json::from_str(&payload) {
                Ok(message) => message,
                Err(e) => {
                    error!(queue = %self.name, message_id = id, error = %e, "Undecodable message, dropping");
                    Self::drop_message(&tx, id)?;
                    continue;
                }
            };

            let attempts = attempts + 1;
            let lease_until = now + self.lease.as_millis() as i64;
            tx.execute(
                "UPDATE queue_messages SET attempts = ?, visible_at = ? WHERE id = ?",
                params![attempts, lease_until, id],
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;
            tx.commit().map_err(|e| QueueError::Database(e.to_string()))?;

            return Ok(Some(Delivery {
                delivery_id: id,
                message,
                attempts,
            }));
        }
    }

    async fn ack(&self, delivery_id: i64) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn
            .execute(
                "DELETE FROM queue_messages WHERE id = ? AND queue = ?",
                params![delivery_id, self.name],
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;
        if removed == 0 {
            debug!(queue = %self.name, delivery_id, "Ack for unknown message");
        }
        Ok(())
    }

    async fn nack(&self, delivery_id: i64) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE queue_messages SET visible_at = ? WHERE id = ? AND queue = ?",
            params![Self::now_millis(), delivery_id, self.name],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(())
    }

    async fn status(&self) -> Result<QueueStatus, QueueError> {
        let conn = self.conn.lock().unwrap();
        let (ready, leased): (i64, i64) = conn
            .query_row(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN visible_at <= ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN visible_at > ?1 THEN 1 ELSE 0 END), 0)
                FROM queue_messages WHERE queue = ?2
                "#,
                params![Self::now_millis(), self.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;

        Ok(QueueStatus {
            name: self.name.clone(),
            ready: ready as u64,
            leased: leased as u64,
        })
    }
}
