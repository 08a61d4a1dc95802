//! Mock notification sender for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{NotificationSender, NotifyError};

/// Records `(address, text)` for every successful send.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationSender {
    sent: Arc<RwLock<Vec<(String, String)>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail until reset.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError::Delivery {
                address: address.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        self.sent
            .write()
            .await
            .push((address.to_string(), text.to_string()));
        Ok(())
    }
}
