//! Ticket pipeline integration tests.
//!
//! submission -> attachment upload -> queue -> worker -> record -> lifecycle

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;

use fieldreport_core::{
    notify::{BacklogNotifier, NotifyOutcome, StaticSubscribers, Subscriber},
    queue::{Attachment, SqliteTicketQueue, TicketIntake, TicketSubmission, TicketWorker, WorkOutcome},
    storage::{LocalBackend, ObjectStore, Prefix},
    testing::MockNotificationSender,
    ticket::{TicketChange, TicketFilter, TicketService, TicketStatus},
    SqliteTicketStore, TicketStore,
};

struct TestHarness {
    objects: Arc<ObjectStore>,
    queue: Arc<SqliteTicketQueue>,
    tickets: Arc<SqliteTicketStore>,
    sender: Arc<MockNotificationSender>,
    notifier: Arc<BacklogNotifier>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let objects = Arc::new(ObjectStore::local(Arc::new(LocalBackend::new(
            temp_dir.path().join("uploads"),
        ))));
        let queue = Arc::new(
            SqliteTicketQueue::new(&db_path, "tickets", Duration::from_secs(30), 5)
                .expect("Failed to create queue"),
        );
        let tickets =
            Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"));
        let sender = Arc::new(MockNotificationSender::new());
        let notifier = Arc::new(BacklogNotifier::new(
            tickets.clone(),
            Some(sender.clone()),
            Arc::new(StaticSubscribers::new(vec![Subscriber {
                address: "100500".to_string(),
                enabled: true,
            }])),
        ));

        Self {
            objects,
            queue,
            tickets,
            sender,
            notifier,
            _temp_dir: temp_dir,
        }
    }

    fn intake(&self) -> TicketIntake {
        TicketIntake::new(Arc::clone(&self.objects), self.queue.clone())
    }

    fn worker(&self) -> TicketWorker {
        TicketWorker::new(self.queue.clone(), self.tickets.clone())
    }

    fn service(&self) -> TicketService {
        TicketService::new(self.tickets.clone(), Arc::clone(&self.objects))
    }
}

fn submission_with(files: &[&str]) -> TicketSubmission {
    TicketSubmission {
        full_name: "Кузнецова Е. В.".to_string(),
        position: "Управляющий".to_string(),
        address: "пр. Победы, 10".to_string(),
        description: "Течёт крыша над подъездом".to_string(),
        attachments: files
            .iter()
            .map(|name| Attachment {
                filename: name.to_string(),
                content_type: Some("image/png".to_string()),
                data: Bytes::from_static(b"\x89PNG photo"),
            })
            .collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_queued_ticket_keeps_uploaded_attachment_name() {
    let harness = TestHarness::new();

    let receipt = harness
        .intake()
        .submit(submission_with(&["a.png"]))
        .await
        .unwrap();
    assert!(receipt.queued);
    assert_eq!(receipt.files.len(), 1);

    // Not a record until the worker runs.
    assert_eq!(harness.tickets.count(&TicketFilter::new()).unwrap(), 0);

    let outcome = harness.worker().run_once().await.unwrap();
    let WorkOutcome::Created(id) = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };

    let ticket = harness.tickets.get(id).unwrap().unwrap();
    assert_eq!(ticket.files, receipt.files);
    assert_eq!(ticket.status, TicketStatus::Unassigned);
    assert!(harness
        .objects
        .exists(Prefix::Tickets, &ticket.files[0])
        .await
        .unwrap());
    assert_eq!(harness.tickets.count(&TicketFilter::new()).unwrap(), 1);
}

#[tokio::test]
async fn test_deleting_ticket_removes_attachments() {
    let harness = TestHarness::new();
    harness
        .intake()
        .submit(submission_with(&["a.png", "b.jpg"]))
        .await
        .unwrap();
    let WorkOutcome::Created(id) = harness.worker().run_once().await.unwrap() else {
        panic!("ticket was not created");
    };
    let files = harness.tickets.get(id).unwrap().unwrap().files;
    assert_eq!(files.len(), 2);

    harness.service().delete_ticket(id).await.unwrap();

    for name in &files {
        assert!(!harness.objects.exists(Prefix::Tickets, name).await.unwrap());
    }
    assert!(harness.tickets.get(id).unwrap().is_none());
}

#[tokio::test]
async fn test_completion_purges_attachments() {
    let harness = TestHarness::new();
    harness
        .intake()
        .submit(submission_with(&["a.png"]))
        .await
        .unwrap();
    let WorkOutcome::Created(id) = harness.worker().run_once().await.unwrap() else {
        panic!("ticket was not created");
    };
    let file = harness.tickets.get(id).unwrap().unwrap().files[0].clone();
    let service = harness.service();

    for status in [TicketStatus::Assigned, TicketStatus::InProgress, TicketStatus::Completed] {
        service
            .update_ticket(
                id,
                TicketChange {
                    status: Some(status),
                    engineer_id: Some(7),
                    engineer_name: Some("Смирнов".to_string()),
                },
            )
            .await
            .unwrap();
    }

    let ticket = harness.tickets.get(id).unwrap().unwrap();
    assert_eq!(ticket.status, TicketStatus::Completed);
    assert!(ticket.completed_at.is_some());
    assert!(ticket.files.is_empty());
    assert!(!harness.objects.exists(Prefix::Tickets, &file).await.unwrap());
}

#[tokio::test]
async fn test_backlog_notified_once_per_count() {
    let harness = TestHarness::new();
    let intake = harness.intake();
    let worker = harness.worker();

    intake.submit(submission_with(&[])).await.unwrap();
    worker.run_once().await.unwrap();

    let first = harness.notifier.check().await.unwrap();
    let second = harness.notifier.check().await.unwrap();
    assert!(matches!(first, NotifyOutcome::Sent { total: 1, delivered: 1, .. }));
    assert_eq!(second, NotifyOutcome::Unchanged { total: 1 });
    assert_eq!(harness.sender.sent().await.len(), 1);

    intake.submit(submission_with(&[])).await.unwrap();
    worker.run_once().await.unwrap();
    harness.notifier.check().await.unwrap();

    let sent = harness.sender.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[1].1.contains("2 заявки без назначения"));
}

#[tokio::test]
async fn test_worker_loop_drains_queue() {
    let harness = TestHarness::new();
    let intake = harness.intake();
    for _ in 0..3 {
        intake.submit(submission_with(&[])).await.unwrap();
    }

    let worker = Arc::new(harness.worker().with_poll_interval(Duration::from_millis(10)));
    worker.start();

    let mut persisted = 0;
    for _ in 0..200 {
        persisted = harness.tickets.count(&TicketFilter::new()).unwrap();
        if persisted == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    worker.stop().await;

    assert_eq!(persisted, 3);
}
