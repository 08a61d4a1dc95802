//! Queue contract shared by the intake producer and the worker.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::ticket::TicketMessage;

/// Errors from a ticket queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Queue operation timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Queue database error: {0}")]
    Database(String),
}

/// A leased message. Until it is acked or nacked no other consumer sees it;
/// an expired lease makes it visible again.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_id: i64,
    pub message: TicketMessage,
    /// How many times this message has been handed out, this one included.
    pub attempts: u32,
}

/// Snapshot of a queue's backlog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub name: String,
    /// Messages waiting to be received.
    pub ready: u64,
    /// Messages currently leased to a consumer.
    pub leased: u64,
}

/// A durable, named queue of ticket messages.
#[async_trait]
pub trait TicketQueue: Send + Sync {
    /// Returns the queue name.
    fn name(&self) -> &str;

    /// Durably enqueue a message.
    async fn publish(&self, message: &TicketMessage) -> Result<(), QueueError>;

    /// Lease the oldest visible message, if any.
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    /// Remove a processed message.
    async fn ack(&self, delivery_id: i64) -> Result<(), QueueError>;

    /// Release a message for redelivery.
    async fn nack(&self, delivery_id: i64) -> Result<(), QueueError>;

    async fn status(&self) -> Result<QueueStatus, QueueError>;
}
