//! Deduplicating backlog notifier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::digest::build_digest;
use super::{NotificationSender, NotifyError, StaticSubscribers, SubscriberDirectory, TelegramSender};
use crate::config::NotifierConfig;
use crate::metrics::{BACKLOG_SIZE, NOTIFICATIONS};
use crate::ticket::{TicketFilter, TicketStatus, TicketStore};

/// Why a changed backlog produced no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoSender,
    NoSubscribers,
}

/// Result of one backlog check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    /// No unassigned tickets; the remembered count was reset.
    Cleared,
    /// Same count as the last notification.
    Unchanged { total: i64 },
    /// Count remembered without sending anything.
    Skipped { total: i64, reason: SkipReason },
    Sent {
        total: i64,
        delivered: usize,
        failed: usize,
    },
}

#[derive(Debug, Default)]
struct NotificationState {
    last_notified: Option<i64>,
}

/// Tells staff about unassigned tickets, at most once per distinct count.
///
/// Checks are serialized on the state lock, so concurrent triggers from
/// several mutation sites cannot both send for the same count. At most one
/// triggered check waits for the lock at a time; further triggers fold into it.
pub struct BacklogNotifier {
    tickets: Arc<dyn TicketStore>,
    sender: Option<Arc<dyn NotificationSender>>,
    subscribers: Arc<dyn SubscriberDirectory>,
    digest_size: usize,
    link_url: Option<String>,
    state: Mutex<NotificationState>,
    trigger_pending: AtomicBool,
}

impl BacklogNotifier {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        sender: Option<Arc<dyn NotificationSender>>,
        subscribers: Arc<dyn SubscriberDirectory>,
    ) -> Self {
        Self {
            tickets,
            sender,
            subscribers,
            digest_size: 3,
            link_url: None,
            state: Mutex::new(NotificationState::default()),
            trigger_pending: AtomicBool::new(false),
        }
    }

    /// Build from config. Without a bot token, or when disabled, the notifier
    /// only tracks the count.
    pub fn from_config(config: &NotifierConfig, tickets: Arc<dyn TicketStore>) -> Self {
        let sender: Option<Arc<dyn NotificationSender>> =
            if config.enabled && !config.bot_token.is_empty() {
                Some(Arc::new(TelegramSender::new(
                    config.api_base.clone(),
                    config.bot_token.clone(),
                    Duration::from_secs(config.timeout_secs),
                )))
            } else {
                None
            };

        Self::new(
            tickets,
            sender,
            Arc::new(StaticSubscribers::from_config(&config.subscribers)),
        )
        .with_digest_size(config.digest_size)
        .with_link_url(config.link_url.clone())
    }

    pub fn with_digest_size(mut self, digest_size: usize) -> Self {
        self.digest_size = digest_size;
        self
    }

    pub fn with_link_url(mut self, link_url: Option<String>) -> Self {
        self.link_url = link_url.filter(|url| !url.trim().is_empty());
        self
    }

    /// Count of the most recent notification (or skip), if any.
    pub async fn last_notified(&self) -> Option<i64> {
        self.state.lock().await.last_notified
    }

    /// Compare the live backlog with the last notified count and notify
    /// subscribers when it changed.
    pub async fn check(&self) -> Result<NotifyOutcome, NotifyError> {
        let state = self.state.lock().await;
        self.check_locked(state).await
    }

    async fn check_locked(
        &self,
        mut state: MutexGuard<'_, NotificationState>,
    ) -> Result<NotifyOutcome, NotifyError> {

        let unassigned = TicketFilter::new().with_status(TicketStatus::Unassigned);
        let total = self.tickets.count(&unassigned)?;
        BACKLOG_SIZE.set(total);

        if total <= 0 {
            state.last_notified = Some(0);
            return Ok(NotifyOutcome::Cleared);
        }
        if state.last_notified == Some(total) {
            debug!(total, "Backlog unchanged, not notifying");
            return Ok(NotifyOutcome::Unchanged { total });
        }

        let Some(sender) = &self.sender else {
            state.last_notified = Some(total);
            return Ok(NotifyOutcome::Skipped {
                total,
                reason: SkipReason::NoSender,
            });
        };

        let recipients: Vec<String> = self
            .subscribers
            .subscribers()
            .await?
            .into_iter()
            .filter(|s| s.enabled)
            .map(|s| s.address)
            .collect();
        if recipients.is_empty() {
            state.last_notified = Some(total);
            return Ok(NotifyOutcome::Skipped {
                total,
                reason: SkipReason::NoSubscribers,
            });
        }

        let newest = self
            .tickets
            .list(&unassigned.with_limit(self.digest_size as i64))?;
        let text = build_digest(total, &newest, self.link_url.as_deref());

        let results = join_all(
            recipients
                .iter()
                .map(|address| sender.send(address, &text)),
        )
        .await;

        let mut delivered = 0;
        let mut failed = 0;
        for result in results {
            match result {
                Ok(()) => {
                    delivered += 1;
                    NOTIFICATIONS.with_label_values(&["sent"]).inc();
                }
                Err(e) => {
                    failed += 1;
                    NOTIFICATIONS.with_label_values(&["failed"]).inc();
                    warn!(sender = %sender.name(), error = %e, "Backlog notification failed");
                }
            }
        }

        // Retry next time if nobody got the message.
        if delivered > 0 {
            state.last_notified = Some(total);
        }

        info!(total, delivered, failed, "Backlog notification sent");
        Ok(NotifyOutcome::Sent {
            total,
            delivered,
            failed,
        })
    }

    /// Run a check in the background, logging any error.
    ///
    /// A trigger that arrives while another triggered check is still waiting
    /// for the lock is dropped; the waiting check reads the count after it
    /// gets the lock, so it covers both.
    pub fn trigger(self: &Arc<Self>) {
        if self.trigger_pending.swap(true, Ordering::AcqRel) {
            debug!("Backlog check already pending");
            return;
        }
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            let state = notifier.state.lock().await;
            notifier.trigger_pending.store(false, Ordering::Release);
            if let Err(e) = notifier.check_locked(state).await {
                warn!("Backlog check failed: {}", e);
            }
        });
    }

    /// Check every `interval` until `shutdown` fires.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Backlog notifier loop started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Backlog notifier loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = notifier.check().await {
                            warn!("Periodic backlog check failed: {}", e);
                        }
                    }
                }
            }
            info!("Backlog notifier loop stopped");
        })
    }
}
