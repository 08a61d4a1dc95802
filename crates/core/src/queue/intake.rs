//! Client-facing ticket submission.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::{QueueError, TicketQueue};
use crate::metrics::TICKETS_QUEUED;
use crate::notify::BacklogNotifier;
use crate::storage::{client_basename, ObjectStore, Prefix, StoreError, DEFAULT_CONTENT_TYPE};
use crate::ticket::TicketMessage;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid ticket: {0}")]
    Validation(String),

    #[error("Failed to store attachment {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: StoreError,
    },

    /// The ticket was not queued; the worker will never see it.
    #[error("Failed to queue ticket: {0}")]
    QueuePublish(#[from] QueueError),
}

impl IntakeError {
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::Validation(msg) => msg.clone(),
            IntakeError::Storage { name, .. } => format!("Failed to save attachment {}", name),
            IntakeError::QueuePublish(_) => {
                "The ticket could not be accepted right now, please try again later".to_string()
            }
        }
    }
}

/// An uploaded file attached to a submission.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A ticket as submitted by a client, before anything is stored.
#[derive(Debug, Clone, Default)]
pub struct TicketSubmission {
    /// Idempotency key. Generated when the client does not send one.
    pub submission_id: Option<String>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub full_name: String,
    pub position: String,
    pub contact: Option<String>,
    pub address: String,
    pub description: String,
    pub client_id: Option<i64>,
    pub attachments: Vec<Attachment>,
}

/// Returned once a ticket is queued. It is not yet a queryable record.
#[derive(Debug, Clone, Serialize)]
pub struct TicketReceipt {
    pub submission_id: String,
    pub queued: bool,
    pub files: Vec<String>,
}

/// Stores attachments and hands tickets to the queue.
pub struct TicketIntake {
    objects: Arc<ObjectStore>,
    queue: Arc<dyn TicketQueue>,
    notifier: Option<Arc<BacklogNotifier>>,
    publish_timeout: Duration,
}

impl TicketIntake {
    pub fn new(objects: Arc<ObjectStore>, queue: Arc<dyn TicketQueue>) -> Self {
        Self {
            objects,
            queue,
            notifier: None,
            publish_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<BacklogNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &Arc<dyn TicketQueue> {
        &self.queue
    }

    pub async fn submit(&self, submission: TicketSubmission) -> Result<TicketReceipt, IntakeError> {
        validate(&submission)?;

        let files = self.store_attachments(&submission.attachments).await?;

        let message = TicketMessage {
            submission_id: submission
                .submission_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            date: submission.date.unwrap_or_else(|| Utc::now().date_naive()),
            full_name: submission.full_name.trim().to_string(),
            position: submission.position.trim().to_string(),
            contact: submission
                .contact
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            address: submission.address.trim().to_string(),
            description: submission.description.trim().to_string(),
            files: files.clone(),
            client_id: submission.client_id,
            submitted_at: Utc::now(),
        };

        let secs = self.publish_timeout.as_secs();
        let published = match tokio::time::timeout(self.publish_timeout, self.queue.publish(&message)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout { secs }),
        };

        if let Err(e) = published {
            TICKETS_QUEUED.with_label_values(&["failed"]).inc();
            warn!(
                submission_id = %message.submission_id,
                queue = %self.queue.name(),
                error = %e,
                "Failed to queue ticket, removing attachments"
            );
            self.discard(&files).await;
            return Err(IntakeError::QueuePublish(e));
        }

        TICKETS_QUEUED.with_label_values(&["queued"]).inc();
        info!(
            submission_id = %message.submission_id,
            attachments = files.len(),
            "Ticket queued"
        );

        if let Some(notifier) = &self.notifier {
            notifier.trigger();
        }

        Ok(TicketReceipt {
            submission_id: message.submission_id,
            queued: true,
            files,
        })
    }

    async fn store_attachments(&self, attachments: &[Attachment]) -> Result<Vec<String>, IntakeError> {
        let mut stored = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let base = attachment_name(&attachment.filename);
            let content_type = attachment
                .content_type
                .as_deref()
                .filter(|ct| !ct.is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE);

            match self
                .objects
                .store_unique(Prefix::Tickets, &base, attachment.data.clone(), content_type)
                .await
            {
                Ok(name) => stored.push(name),
                Err(source) => {
                    self.discard(&stored).await;
                    return Err(IntakeError::Storage {
                        name: attachment.filename.clone(),
                        source,
                    });
                }
            }
        }

        Ok(stored)
    }

    async fn discard(&self, names: &[String]) {
        for name in names {
            if let Err(e) = self.objects.delete(Prefix::Tickets, name).await {
                warn!(name = %name, error = %e, "Failed to remove attachment");
            }
        }
    }
}

fn validate(submission: &TicketSubmission) -> Result<(), IntakeError> {
    let required = [
        ("fullName", &submission.full_name),
        ("address", &submission.address),
        ("description", &submission.description),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(IntakeError::Validation(format!("{} is required", field)));
        }
    }
    for attachment in &submission.attachments {
        if attachment.data.is_empty() {
            return Err(IntakeError::Validation(format!(
                "attachment {} is empty",
                attachment.filename
            )));
        }
    }
    Ok(())
}

/// `YYYYMMDDHHMMSS_<basename>`, with any client-side directories dropped.
fn attachment_name(original: &str) -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        client_basename(original)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryObjectBackend, MockTicketQueue};

    fn submission() -> TicketSubmission {
        TicketSubmission {
            full_name: "Петров П.".to_string(),
            position: "Завхоз".to_string(),
            address: "ул. Мира, 5".to_string(),
            description: "Не работает лифт".to_string(),
            ..Default::default()
        }
    }

    fn attachment(name: &str) -> Attachment {
        Attachment {
            filename: name.to_string(),
            content_type: Some("image/png".to_string()),
            data: Bytes::from_static(b"png-bytes"),
        }
    }

    #[test]
    fn test_attachment_name_keeps_basename() {
        let name = attachment_name("C:\\photos\\a.png");
        assert!(name.ends_with("_a.png"));
        assert_eq!(name.len(), "20250101120000_a.png".len());
        assert!(attachment_name("../").ends_with("_file"));
    }

    #[tokio::test]
    async fn test_submit_uploads_and_publishes() {
        let objects = Arc::new(MemoryObjectBackend::default());
        let queue = Arc::new(MockTicketQueue::new());
        let intake = TicketIntake::new(Arc::new(ObjectStore::local(objects.clone())), queue.clone());

        let mut submission = submission();
        submission.submission_id = Some("abc".to_string());
        submission.attachments = vec![attachment("a.png")];
        let receipt = intake.submit(submission).await.unwrap();

        assert_eq!(receipt.submission_id, "abc");
        assert_eq!(receipt.files.len(), 1);
        assert!(objects.contains(Prefix::Tickets, &receipt.files[0]).await);

        let published = queue.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].files, receipt.files);
    }

    #[tokio::test]
    async fn test_validation_failure_has_no_side_effects() {
        let objects = Arc::new(MemoryObjectBackend::default());
        let queue = Arc::new(MockTicketQueue::new());
        let intake = TicketIntake::new(Arc::new(ObjectStore::local(objects.clone())), queue.clone());

        let mut submission = submission();
        submission.address = "  ".to_string();
        submission.attachments = vec![attachment("a.png")];
        let err = intake.submit(submission).await.unwrap_err();

        assert!(matches!(err, IntakeError::Validation(_)));
        assert!(objects.is_empty().await);
        assert!(queue.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_removes_attachments() {
        let objects = Arc::new(MemoryObjectBackend::default());
        let queue = Arc::new(MockTicketQueue::new());
        queue.set_fail_publish(true).await;
        let intake = TicketIntake::new(Arc::new(ObjectStore::local(objects.clone())), queue.clone());

        let mut submission = submission();
        submission.attachments = vec![attachment("a.png"), attachment("b.png")];
        let err = intake.submit(submission).await.unwrap_err();

        assert!(matches!(err, IntakeError::QueuePublish(_)));
        assert!(!err.user_message().contains("mock"));
        assert!(objects.is_empty().await);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_submission() {
        let objects = Arc::new(MemoryObjectBackend::default());
        objects.set_fail_writes(true).await;
        let queue = Arc::new(MockTicketQueue::new());
        let intake = TicketIntake::new(Arc::new(ObjectStore::local(objects.clone())), queue.clone());

        let mut submission = submission();
        submission.attachments = vec![attachment("a.png")];
        let err = intake.submit(submission).await.unwrap_err();

        assert!(matches!(err, IntakeError::Storage { .. }));
        assert!(queue.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_generated_submission_ids_are_unique() {
        let queue = Arc::new(MockTicketQueue::new());
        let intake = TicketIntake::new(
            Arc::new(ObjectStore::local(Arc::new(MemoryObjectBackend::default()))),
            queue.clone(),
        );

        let a = intake.submit(submission()).await.unwrap();
        let b = intake.submit(submission()).await.unwrap();
        assert_ne!(a.submission_id, b.submission_id);
    }
}
