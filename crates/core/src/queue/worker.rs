//! Background consumer that turns queued messages into ticket records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{QueueError, TicketQueue};
use crate::metrics::TICKETS_PERSISTED;
use crate::notify::BacklogNotifier;
use crate::ticket::{InsertOutcome, TicketStore};

/// What a single poll of the queue did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Nothing to consume.
    Idle,
    Created(i64),
    /// The submission was already recorded by an earlier delivery.
    Duplicate(i64),
    /// The insert failed and the message was released for redelivery.
    Failed,
}

/// Single logical consumer of the ticket queue.
///
/// A message is acknowledged only after its ticket is inserted. Inserts are
/// idempotent on `submission_id`, so a redelivered message never produces a
/// second ticket.
pub struct TicketWorker {
    queue: Arc<dyn TicketQueue>,
    tickets: Arc<dyn TicketStore>,
    notifier: Option<Arc<BacklogNotifier>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TicketWorker {
    pub fn new(queue: Arc<dyn TicketQueue>, tickets: Arc<dyn TicketStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            queue,
            tickets,
            notifier: None,
            poll_interval: Duration::from_millis(500),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<BacklogNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the consumer loop.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Ticket worker already running");
            return;
        }

        let worker = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(queue = %worker.queue.name(), "Ticket worker started");
            loop {
                // Drain everything visible before sleeping again.
                loop {
                    if !worker.running.load(Ordering::Relaxed) {
                        break;
                    }
                    match worker.run_once().await {
                        Ok(WorkOutcome::Idle) | Ok(WorkOutcome::Failed) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Ticket worker poll failed: {}", e);
                            break;
                        }
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Ticket worker received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(worker.poll_interval) => {
                        if !worker.running.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                }
            }
            info!("Ticket worker stopped");
        });
    }

    /// Stop consuming. The message in flight, if any, is finished first.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Ticket worker not running");
            return;
        }

        info!("Stopping ticket worker");
        let _ = self.shutdown_tx.send(());

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    /// Receive and process at most one message.
    pub async fn run_once(&self) -> Result<WorkOutcome, QueueError> {
        let Some(delivery) = self.queue.receive().await? else {
            return Ok(WorkOutcome::Idle);
        };

        let submission_id = delivery.message.submission_id.clone();
        debug!(
            submission_id = %submission_id,
            attempts = delivery.attempts,
            "Processing queued ticket"
        );

        match self.tickets.insert(&delivery.message) {
            Ok(outcome) => {
                self.queue.ack(delivery.delivery_id).await?;
                match outcome {
                    InsertOutcome::Created(ticket) => {
                        TICKETS_PERSISTED.with_label_values(&["created"]).inc();
                        info!(ticket_id = ticket.id, submission_id = %submission_id, "Ticket persisted");
                        if let Some(notifier) = &self.notifier {
                            notifier.trigger();
                        }
                        Ok(WorkOutcome::Created(ticket.id))
                    }
                    InsertOutcome::Duplicate(ticket) => {
                        TICKETS_PERSISTED.with_label_values(&["duplicate"]).inc();
                        debug!(ticket_id = ticket.id, submission_id = %submission_id, "Duplicate delivery ignored");
                        Ok(WorkOutcome::Duplicate(ticket.id))
                    }
                }
            }
            Err(e) => {
                TICKETS_PERSISTED.with_label_values(&["failed"]).inc();
                error!(
                    submission_id = %submission_id,
                    attempts = delivery.attempts,
                    error = %e,
                    "Failed to persist ticket, releasing for redelivery"
                );
                self.queue.nack(delivery.delivery_id).await?;
                Ok(WorkOutcome::Failed)
            }
        }
    }
}
