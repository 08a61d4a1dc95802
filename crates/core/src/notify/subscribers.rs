use async_trait::async_trait;
use serde::Serialize;

use super::NotifyError;
use crate::config::SubscriberConfig;

/// A staff member who may receive backlog notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscriber {
    /// Opaque channel address, e.g. a Telegram chat id.
    pub address: String,
    pub enabled: bool,
}

/// Source of notification subscribers.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn subscribers(&self) -> Result<Vec<Subscriber>, NotifyError>;
}

/// Subscribers fixed at startup from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscribers {
    subscribers: Vec<Subscriber>,
}

impl StaticSubscribers {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self { subscribers }
    }

    pub fn from_config(configs: &[SubscriberConfig]) -> Self {
        Self::new(
            configs
                .iter()
                .filter(|c| !c.address.trim().is_empty())
                .map(|c| Subscriber {
                    address: c.address.trim().to_string(),
                    enabled: c.enabled,
                })
                .collect(),
        )
    }
}

#[async_trait]
impl SubscriberDirectory for StaticSubscribers {
    async fn subscribers(&self) -> Result<Vec<Subscriber>, NotifyError> {
        Ok(self.subscribers.clone())
    }
}
