//! Mock ticket queue for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::queue::{Delivery, QueueError, QueueStatus, TicketQueue};
use crate::ticket::TicketMessage;

#[derive(Debug, Default)]
struct QueueState {
    next_id: i64,
    ready: VecDeque<Delivery>,
    leased: Vec<Delivery>,
    published: Vec<TicketMessage>,
    acked: Vec<i64>,
}

/// In-memory queue that can be told to reject publishes.
#[derive(Debug, Clone, Default)]
pub struct MockTicketQueue {
    state: Arc<RwLock<QueueState>>,
    fail_publish: Arc<RwLock<bool>>,
}

impl MockTicketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_publish(&self, fail: bool) {
        *self.fail_publish.write().await = fail;
    }

    /// Every message successfully published, in order.
    pub async fn published(&self) -> Vec<TicketMessage> {
        self.state.read().await.published.clone()
    }

    pub async fn acked(&self) -> Vec<i64> {
        self.state.read().await.acked.clone()
    }
}

#[async_trait]
impl TicketQueue for MockTicketQueue {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(&self, message: &TicketMessage) -> Result<(), QueueError> {
        if *self.fail_publish.read().await {
            return Err(QueueError::Unavailable("simulated outage".to_string()));
        }
        let mut state = self.state.write().await;
        state.next_id += 1;
        let delivery = Delivery {
            delivery_id: state.next_id,
            message: message.clone(),
            attempts: 0,
        };
        state.ready.push_back(delivery);
        state.published.push(message.clone());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let mut state = self.state.write().await;
        let Some(mut delivery) = state.ready.pop_front() else {
            return Ok(None);
        };
        delivery.attempts += 1;
        state.leased.push(delivery.clone());
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery_id: i64) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        state.leased.retain(|d| d.delivery_id != delivery_id);
        state.acked.push(delivery_id);
        Ok(())
    }

    async fn nack(&self, delivery_id: i64) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        if let Some(pos) = state.leased.iter().position(|d| d.delivery_id == delivery_id) {
            let delivery = state.leased.remove(pos);
            state.ready.push_front(delivery);
        }
        Ok(())
    }

    async fn status(&self) -> Result<QueueStatus, QueueError> {
        let state = self.state.read().await;
        Ok(QueueStatus {
            name: "mock".to_string(),
            ready: state.ready.len() as u64,
            leased: state.leased.len() as u64,
        })
    }
}
