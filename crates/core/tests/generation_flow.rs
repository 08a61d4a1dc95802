//! Report generation integration tests.
//!
//! These tests run the orchestrator against real on-disk stores:
//! backend fallback -> artifact storage -> report record -> ticket linkage

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use fieldreport_core::{
    generation::{GenerationBackend, GenerationError, SubprocessBackend},
    report::{ReportFilter, ReportStore},
    storage::{LocalBackend, ObjectStore, Prefix},
    testing::{fixtures, MockGenerationBackend},
    DocumentOrchestrator, SqliteReportStore, SqliteTicketStore, TicketStore,
};

struct TestHarness {
    objects: Arc<ObjectStore>,
    reports: Arc<SqliteReportStore>,
    tickets: Arc<SqliteTicketStore>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let objects = Arc::new(ObjectStore::local(Arc::new(LocalBackend::new(
            temp_dir.path().join("uploads"),
        ))));
        let reports =
            Arc::new(SqliteReportStore::new(&db_path).expect("Failed to create report store"));
        let tickets =
            Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"));

        Self {
            objects,
            reports,
            tickets,
            temp_dir,
        }
    }

    fn orchestrator(&self, backends: Vec<Arc<dyn GenerationBackend>>) -> DocumentOrchestrator {
        DocumentOrchestrator::new(
            backends,
            Arc::clone(&self.objects),
            self.reports.clone(),
            self.tickets.clone(),
        )
        .with_attempt_timeout(Duration::from_millis(300))
    }
}

#[tokio::test]
async fn test_timed_out_backend_is_not_retried() {
    let harness = TestHarness::new();
    let slow = Arc::new(MockGenerationBackend::hanging("grpc"));
    let fallback = Arc::new(MockGenerationBackend::succeeding("http", "Отчет_ТО.pdf"));
    let orchestrator = harness.orchestrator(vec![slow.clone(), fallback.clone()]);

    let result = orchestrator
        .generate_report(fixtures::generation_request("ул. Садовая, 3"))
        .await
        .expect("generation should fall back");

    assert_eq!(result.backend, "http");
    assert_eq!(slow.call_count().await, 1);
    assert_eq!(fallback.call_count().await, 1);

    let stored = harness
        .temp_dir
        .path()
        .join("uploads/reports/Отчет_ТО.pdf");
    assert!(stored.exists());
    assert!(harness
        .objects
        .exists(Prefix::Previews, "Отчет_ТО.png")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_all_backends_failing_leaves_no_trace() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(vec![
        Arc::new(MockGenerationBackend::failing("grpc")),
        Arc::new(MockGenerationBackend::hanging("http")),
        Arc::new(MockGenerationBackend::failing("subprocess")),
    ]);

    let err = orchestrator
        .generate_report(fixtures::generation_request("ул. Садовая, 3"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GenerationError::AllBackendsFailed { attempts: 3, .. }
    ));
    assert!(harness
        .reports
        .list(&ReportFilter::new())
        .unwrap()
        .is_empty());
    assert!(harness.objects.list(Prefix::Reports).await.unwrap().is_empty());
    assert!(harness.objects.list(Prefix::Previews).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_report_auto_links_to_unassigned_ticket_at_address() {
    let harness = TestHarness::new();
    let ticket = harness
        .tickets
        .insert(&fixtures::ticket_message("sub-1", "X"))
        .unwrap()
        .ticket()
        .clone();
    let orchestrator =
        harness.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "x.pdf"))]);

    let result = orchestrator
        .generate_report(fixtures::generation_request("X"))
        .await
        .unwrap();

    assert_eq!(result.linked_ticket, Some(ticket.id));
    let linked = harness.reports.reports_for_ticket(ticket.id).unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].id, result.report.id);
}

#[tokio::test]
async fn test_report_without_matching_ticket_is_unlinked() {
    let harness = TestHarness::new();
    let other = harness
        .tickets
        .insert(&fixtures::ticket_message("sub-1", "Y"))
        .unwrap()
        .ticket()
        .clone();
    let orchestrator =
        harness.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "x.pdf"))]);

    let result = orchestrator
        .generate_report(fixtures::generation_request("X"))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.linked_ticket, None);
    assert!(harness.reports.reports_for_ticket(other.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_same_name_twice_gets_distinct_objects() {
    let harness = TestHarness::new();
    let orchestrator =
        harness.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);

    let first = orchestrator
        .generate_report(fixtures::generation_request("A"))
        .await
        .unwrap();
    let second = orchestrator
        .generate_report(fixtures::generation_request("B"))
        .await
        .unwrap();

    assert_eq!(first.primary_name, "r.pdf");
    assert_eq!(second.primary_name, "r(1).pdf");
    assert_eq!(second.preview_name.as_deref(), Some("r(1).png"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_subprocess_backend_end_to_end() {
    let harness = TestHarness::new();
    let staging = harness.temp_dir.path().join("staging");
    std::fs::create_dir_all(staging.join("reports")).unwrap();
    std::fs::create_dir_all(staging.join("previews")).unwrap();

    // The script writes its outputs into staging and prints their names.
    let script = harness.temp_dir.path().join("generate.sh");
    let body = format!(
        "test -f \"$1\" || exit 3\nprintf '%%PDF' > {dir}/reports/script.pdf\nprintf 'PNG' > {dir}/previews/script.png\necho 'Rendering 100%'\necho script.pdf\necho script.png\n",
        dir = staging.display()
    );
    std::fs::write(&script, body).unwrap();

    let backend = Arc::new(SubprocessBackend::new(
        vec!["sh".to_string()],
        &script,
        &staging,
    ));
    let orchestrator = harness.orchestrator(vec![backend]);

    let result = orchestrator
        .generate_report(fixtures::generation_request("ул. Садовая, 3"))
        .await
        .unwrap();

    assert_eq!(result.backend, "subprocess");
    assert_eq!(result.primary_name, "script.pdf");
    assert!(harness.objects.exists(Prefix::Reports, "script.pdf").await.unwrap());
    // staged files are consumed
    assert!(!staging.join("reports/script.pdf").exists());
    assert!(!staging.join("previews/script.png").exists());
}
