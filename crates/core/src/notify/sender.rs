//! Outbound delivery of notification messages.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::ticket::TicketError;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to read backlog: {0}")]
    Tickets(#[from] TicketError),

    #[error("Failed to load subscribers: {0}")]
    Subscribers(String),

    #[error("Delivery to {address} failed: {reason}")]
    Delivery { address: String, reason: String },
}

/// Delivers a message to one subscriber address.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Returns the name of this channel, used in logs.
    fn name(&self) -> &str;

    async fn send(&self, address: &str, text: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API `sendMessage` with HTML parse mode.
pub struct TelegramSender {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSender {
    /// Create a sender whose API calls give up after `timeout`.
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), NotifyError> {
        let delivery_error = |reason: String| NotifyError::Delivery {
            address: address.to_string(),
            reason,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .form(&[("chat_id", address), ("text", text), ("parse_mode", "HTML")])
            .send()
            .await
            // reqwest errors carry the URL, which contains the token
            .map_err(|e| delivery_error(e.without_url().to_string()))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| delivery_error(format!("HTTP {}: {}", status, e.without_url())))?;

        if !body.ok {
            return Err(delivery_error(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        debug!(chat_id = %address, "Telegram message delivered");
        Ok(())
    }
}
