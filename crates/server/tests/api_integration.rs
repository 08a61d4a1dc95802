//! HTTP API integration tests.
//!
//! Requests go through the full router with in-memory storage and mock
//! generation and notification backends.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;
use fieldreport_core::{testing::MockGenerationBackend, Prefix};

fn report_request(address: &str) -> serde_json::Value {
    json!({
        "date": "2025-01-15",
        "address": address,
        "machine_name": "Лифт пассажирский",
        "classification": "ТО",
        "checklistItems": [{ "task": "Осмотр кабины", "done": true }],
        "firstName": "Пётр",
        "lastName": "Сидоров"
    })
}

// ============================================================================
// Health and config
// ============================================================================

#[tokio::test]
async fn test_health_reports_storage_and_backends() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["storage"], "local");
    assert_eq!(response.body["generation_backends"], json!(["grpc"]));
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["notifier"]["bot_token_configured"], false);
    assert!(response.body["notifier"].get("bot_token").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prometheus_text() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, _, body) = fixture.get_raw("/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("fieldreport_http_requests_total"));
    assert!(text.contains("fieldreport_tickets_by_status"));
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_generate_report_and_download_artifacts() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/reports", report_request("ул. Мира, 1"))
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["primary_name"], "report.pdf");
    assert_eq!(response.body["preview_name"], "report.png");
    assert_eq!(response.body["backend"], "grpc");
    assert_eq!(response.body["success"], true);

    let (status, headers, body) = fixture.get_raw("/api/v1/files/reports/report.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/pdf");
    assert_eq!(headers["x-object-source"], "local");
    assert_eq!(headers["content-length"], body.len().to_string().as_str());
    assert!(body.starts_with(b"%PDF"));

    let (status, headers, _) = fixture.get_raw("/api/v1/files/previews/report.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "image/png");
}

#[tokio::test]
async fn test_generated_names_do_not_overwrite() {
    let fixture = TestFixture::new().await;

    fixture
        .post("/api/v1/reports", report_request("ул. Мира, 1"))
        .await;
    let second = fixture
        .post("/api/v1/reports", report_request("ул. Мира, 2"))
        .await;

    assert_eq!(second.status, StatusCode::CREATED);
    assert_eq!(second.body["primary_name"], "report(1).pdf");
    assert_eq!(second.body["preview_name"], "report(1).png");

    let list = fixture.get("/api/v1/reports").await;
    assert_eq!(list.body["reports"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_generate_report_rejects_missing_address() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/reports", json!({ "date": "2025-01-15", "address": "" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(fixture.generator.call_count().await, 0);
}

#[tokio::test]
async fn test_generation_failure_returns_bad_gateway() {
    let fixture = TestFixture::with_generator(MockGenerationBackend::failing("grpc")).await;

    let response = fixture
        .post("/api/v1/reports", report_request("ул. Мира, 1"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(response.body["error"].is_string());

    let list = fixture.get("/api/v1/reports").await;
    assert!(list.body["reports"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_report_auto_links_to_open_ticket() {
    let fixture = TestFixture::new().await;
    let ticket_id = fixture.create_ticket("ул. Мира, 1").await;

    let response = fixture
        .post("/api/v1/reports", report_request("ул. Мира, 1"))
        .await;
    assert_eq!(response.body["linked_ticket"], ticket_id);

    let linked = fixture
        .get(&format!("/api/v1/tickets/{}/reports", ticket_id))
        .await;
    assert_eq!(linked.status, StatusCode::OK);
    assert_eq!(linked.body[0]["filename"], "report.pdf");
}

#[tokio::test]
async fn test_upload_report() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart(
            "/api/v1/reports/upload",
            &[("date", "2025-01-15"), ("address", "Mira 1")],
            &[("file", "scan.pdf", b"%PDF-1.7 scanned".as_slice())],
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["backend"], "upload");
    assert_eq!(response.body["primary_name"], "scan.pdf");
    assert_eq!(fixture.generator.call_count().await, 0);

    let list = fixture.get("/api/v1/reports?address=Mira%201").await;
    assert_eq!(list.body["reports"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_report_drops_client_directories() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart(
            "/api/v1/reports/upload",
            &[("date", "2025-01-15"), ("address", "Mira 1")],
            &[("file", "C:\\scans\\a.pdf", b"%PDF-1.7".as_slice())],
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["primary_name"], "a.pdf");
    assert!(fixture.objects.contains(Prefix::Reports, "a.pdf").await);
}

#[tokio::test]
async fn test_upload_report_without_file_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart(
            "/api/v1/reports/upload",
            &[("date", "2025-01-15"), ("address", "ул. Мира, 1")],
            &[],
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_report_removes_artifacts() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/v1/reports", report_request("ул. Мира, 1"))
        .await;

    let response = fixture.delete("/api/v1/reports/report.pdf").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["filename"], "report.pdf");

    let (status, _, _) = fixture.get_raw("/api/v1/files/reports/report.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = fixture.get_raw("/api/v1/files/previews/report.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let again = fixture.delete("/api/v1/reports/report.pdf").await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_file_prefix_is_not_found() {
    let fixture = TestFixture::new().await;

    let (status, _, _) = fixture.get_raw("/api/v1/files/secrets/a.pdf").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Tickets
// ============================================================================

#[tokio::test]
async fn test_ticket_is_queued_before_it_is_listed() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/tickets",
            json!({
                "submissionId": "sub-42",
                "fullName": "Кузнецова Е. В.",
                "address": "пр. Победы, 10",
                "description": "Течёт крыша"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["submission_id"], "sub-42");
    assert_eq!(response.body["queued"], true);

    let before = fixture.get("/api/v1/tickets").await;
    assert_eq!(before.body["total"], 0);

    let queue = fixture.get("/api/v1/queue/status").await;
    assert_eq!(queue.body["ready"], 1);

    fixture.worker.run_once().await.unwrap();

    let after = fixture.get("/api/v1/tickets").await;
    assert_eq!(after.body["total"], 1);
    assert_eq!(after.body["tickets"][0]["submission_id"], "sub-42");
    assert_eq!(after.body["tickets"][0]["status"], "unassigned");
}

#[tokio::test]
async fn test_ticket_with_attachment() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart(
            "/api/v1/tickets",
            &[
                ("fullName", "Кузнецова Е. В."),
                ("address", "пр. Победы, 10"),
                ("description", "Трещина в стене"),
                ("date", "2025-02-01"),
            ],
            &[("files", "photo.png", b"\x89PNG photo".as_slice())],
        )
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED, "{:?}", response.body);
    let name = response.body["files"][0].as_str().unwrap().to_string();
    assert!(name.ends_with("_photo.png"));

    fixture.worker.run_once().await.unwrap();
    let list = fixture.get("/api/v1/tickets?date=2025-02-01").await;
    assert_eq!(list.body["total"], 1);
    assert_eq!(list.body["tickets"][0]["files"][0], name.as_str());

    let (status, _, body) = fixture
        .get_raw(&format!("/api/v1/files/tickets/{}", name))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"\x89PNG photo");
}

#[tokio::test]
async fn test_ticket_requires_description() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/tickets",
            json!({ "fullName": "Иванов", "address": "ул. Мира, 1" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let queue = fixture.get("/api/v1/queue/status").await;
    assert_eq!(queue.body["ready"], 0);
}

#[tokio::test]
async fn test_list_tickets_filters() {
    let fixture = TestFixture::new().await;
    fixture.create_ticket("ул. Мира, 1").await;
    let other = fixture.create_ticket("Sadovaya 3").await;
    fixture
        .put(
            &format!("/api/v1/tickets/{}", other),
            json!({ "status": "assigned", "engineer_id": 7, "engineer_name": "Смирнов" }),
        )
        .await;

    let unassigned = fixture.get("/api/v1/tickets?status=unassigned").await;
    assert_eq!(unassigned.body["total"], 1);

    let search = fixture.get("/api/v1/tickets?search=Sadovaya").await;
    assert_eq!(search.body["total"], 1);
    assert_eq!(search.body["tickets"][0]["id"], other);

    let paged = fixture.get("/api/v1/tickets?limit=1&offset=1").await;
    assert_eq!(paged.body["total"], 2);
    assert_eq!(paged.body["tickets"].as_array().unwrap().len(), 1);

    let bad = fixture.get("/api/v1/tickets?status=lost").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ticket_lifecycle_over_http() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_ticket("ул. Мира, 1").await;
    let path = format!("/api/v1/tickets/{}", id);

    let assigned = fixture
        .put(
            &path,
            json!({ "status": "assigned", "engineer_id": 7, "engineer_name": "Смирнов" }),
        )
        .await;
    assert_eq!(assigned.status, StatusCode::OK);
    assert_eq!(assigned.body["status"], "assigned");
    assert_eq!(assigned.body["engineer_name"], "Смирнов");

    fixture.put(&path, json!({ "status": "in_progress" })).await;
    let completed = fixture.put(&path, json!({ "status": "completed" })).await;
    assert_eq!(completed.body["status"], "completed");
    assert!(completed.body["completed_at"].is_string());

    let reopen = fixture.put(&path, json!({ "status": "assigned" })).await;
    assert_eq!(reopen.status, StatusCode::CONFLICT);

    let deleted = fixture.delete(&path).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(fixture.get(&path).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_ticket_is_not_found() {
    let fixture = TestFixture::new().await;

    assert_eq!(
        fixture.get("/api/v1/tickets/999").await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        fixture
            .put("/api/v1/tickets/999", json!({ "status": "assigned" }))
            .await
            .status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        fixture.get("/api/v1/tickets/999/reports").await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_explicit_link_and_unlink() {
    let fixture = TestFixture::new().await;
    let ticket_id = fixture.create_ticket("ул. Мира, 1").await;
    let report = fixture
        .post("/api/v1/reports", report_request("ул. Садовая, 3"))
        .await;
    assert!(report.body.get("linked_ticket").is_none());
    let report_id = report.body["report"]["id"].as_i64().unwrap();

    let path = format!("/api/v1/tickets/{}/reports", ticket_id);
    let first = fixture.post(&path, json!({ "report_id": report_id })).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["result"], "linked");

    let second = fixture.post(&path, json!({ "report_id": report_id })).await;
    assert_eq!(second.body["result"], "already_linked");

    let unlink_path = format!("/api/v1/tickets/{}/reports/{}", ticket_id, report_id);
    assert_eq!(
        fixture.delete(&unlink_path).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        fixture.delete(&unlink_path).await.status,
        StatusCode::NOT_FOUND
    );

    let missing = fixture.post(&path, json!({ "report_id": 999 })).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Backlog notifier
// ============================================================================

#[tokio::test]
async fn test_notify_backlog_sends_once_per_count() {
    let fixture = TestFixture::new().await;
    fixture.create_ticket("ул. Мира, 1").await;

    let first = fixture.post("/api/v1/admin/notify-backlog", json!({})).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["outcome"], "sent");
    assert_eq!(first.body["total"], 1);

    let second = fixture.post("/api/v1/admin/notify-backlog", json!({})).await;
    assert_eq!(second.body["outcome"], "unchanged");

    let sent = fixture.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "100500");
}

// ============================================================================
// File library
// ============================================================================

#[tokio::test]
async fn test_library_upload_list_and_search() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart(
            "/api/v1/library",
            &[],
            &[
                ("file", "Инструкция.pdf", b"%PDF-1.7 manual".as_slice()),
                ("file", "plan.docx", b"docx".as_slice()),
                ("file", "Инструкция.pdf", b"%PDF-1.7 copy".as_slice()),
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    let stored: Vec<_> = response.body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["filename"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(stored, vec!["Инструкция.pdf", "plan.docx", "Инструкция(1).pdf"]);

    let all = fixture.get("/api/v1/library").await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["files"].as_array().unwrap().len(), 3);

    let found = fixture.get("/api/v1/library?query=plan").await;
    assert_eq!(found.body["files"].as_array().unwrap().len(), 1);
    assert_eq!(found.body["files"][0]["filename"], "plan.docx");

    let (status, _, body) = fixture.get_raw("/api/v1/files/files/plan.docx").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"docx");
}

#[tokio::test]
async fn test_library_rename_and_delete() {
    let fixture = TestFixture::new().await;
    fixture
        .post_multipart(
            "/api/v1/library",
            &[],
            &[
                ("file", "draft.pdf", b"one".as_slice()),
                ("file", "other.pdf", b"two".as_slice()),
            ],
        )
        .await;

    let renamed = fixture
        .put(
            "/api/v1/library/rename",
            json!({ "oldName": "draft.pdf", "newName": "final" }),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK, "{:?}", renamed.body);
    assert_eq!(renamed.body["filename"], "final.pdf");
    assert!(fixture.objects.contains(Prefix::Files, "final.pdf").await);
    assert!(!fixture.objects.contains(Prefix::Files, "draft.pdf").await);

    let taken = fixture
        .put(
            "/api/v1/library/rename",
            json!({ "oldName": "final.pdf", "newName": "other" }),
        )
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let deleted = fixture.delete("/api/v1/library/final.pdf").await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(!fixture.objects.contains(Prefix::Files, "final.pdf").await);
    assert!(fixture.files.find("final.pdf").unwrap().is_none());

    let missing = fixture.delete("/api/v1/library/final.pdf").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_library_upload_without_file_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart("/api/v1/library", &[("note", "empty")], &[])
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
