//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with in-memory storage, a SQLite queue and scripted generation and
//! notification backends, so the HTTP surface can be exercised without
//! external infrastructure.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use fieldreport_core::{
    notify::{StaticSubscribers, Subscriber},
    queue::SqliteTicketQueue,
    testing::{MemoryObjectBackend, MockGenerationBackend, MockNotificationSender},
    BacklogNotifier, Config, DocumentOrchestrator, FileLibrary, FileStore, GenerationBackend,
    ObjectStore, ReportStore, SqliteFileStore, SqliteReportStore, SqliteTicketStore, TicketIntake,
    TicketService, TicketStore, TicketWorker,
};

/// Re-export fixtures for test convenience
pub use fieldreport_core::testing::fixtures;

const BOUNDARY: &str = "fieldreport-test-boundary";

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_report_generation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/reports", json!({
///         "date": "2025-01-15",
///         "address": "ул. Мира, 1"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Active object backend, inspectable by tests
    pub objects: Arc<MemoryObjectBackend>,
    pub object_store: Arc<ObjectStore>,
    /// Generation backend - configure success or failure
    pub generator: Arc<MockGenerationBackend>,
    /// Records every backlog digest sent
    pub sender: Arc<MockNotificationSender>,
    pub tickets: Arc<dyn TicketStore>,
    pub reports: Arc<dyn ReportStore>,
    pub files: Arc<dyn FileStore>,
    /// Worker over the fixture queue, driven manually with `run_once`
    pub worker: TicketWorker,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with a succeeding generation backend.
    pub async fn new() -> Self {
        Self::with_generator(MockGenerationBackend::succeeding("grpc", "report.pdf")).await
    }

    pub async fn with_generator(generator: MockGenerationBackend) -> Self {
        let generator = Arc::new(generator);
        let objects = Arc::new(MemoryObjectBackend::default());
        let object_store = Arc::new(ObjectStore::local(objects.clone()));

        let tickets: Arc<dyn TicketStore> =
            Arc::new(SqliteTicketStore::in_memory().expect("Failed to create ticket store"));
        let reports: Arc<dyn ReportStore> =
            Arc::new(SqliteReportStore::in_memory().expect("Failed to create report store"));
        let files: Arc<dyn FileStore> =
            Arc::new(SqliteFileStore::in_memory().expect("Failed to create file store"));
        let queue =
            Arc::new(SqliteTicketQueue::in_memory("tickets").expect("Failed to create queue"));

        let sender = Arc::new(MockNotificationSender::new());
        let notifier = Arc::new(BacklogNotifier::new(
            Arc::clone(&tickets),
            Some(sender.clone()),
            Arc::new(StaticSubscribers::new(vec![Subscriber {
                address: "100500".to_string(),
                enabled: true,
            }])),
        ));

        let backends: Vec<Arc<dyn GenerationBackend>> = vec![generator.clone()];
        let orchestrator = DocumentOrchestrator::new(
            backends,
            Arc::clone(&object_store),
            Arc::clone(&reports),
            Arc::clone(&tickets),
        );
        let service = TicketService::new(Arc::clone(&tickets), Arc::clone(&object_store));
        let intake = TicketIntake::new(Arc::clone(&object_store), queue.clone());
        let worker = TicketWorker::new(queue, Arc::clone(&tickets));
        let library = FileLibrary::new(Arc::clone(&files), Arc::clone(&object_store));

        let state = Arc::new(fieldreport_server::state::AppState::new(
            Config::default(),
            Arc::clone(&object_store),
            Arc::new(service),
            Arc::clone(&reports),
            Arc::new(library),
            Arc::new(orchestrator),
            Arc::new(intake),
            notifier,
        ));

        let router = fieldreport_server::api::create_router(state);

        Self {
            router,
            objects,
            object_store,
            generator,
            sender,
            tickets,
            reports,
            files,
            worker,
        }
    }

    /// Submit a ticket as JSON and let the worker persist it. Returns its id.
    pub async fn create_ticket(&self, address: &str) -> i64 {
        let response = self
            .post(
                "/api/v1/tickets",
                serde_json::json!({
                    "fullName": "Иванова А. С.",
                    "position": "Администратор",
                    "address": address,
                    "description": "Не работает освещение"
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{:?}", response.body);

        match self.worker.run_once().await.expect("worker failed") {
            fieldreport_core::queue::WorkOutcome::Created(id) => id,
            other => panic!("ticket was not created: {:?}", other),
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a GET request and return the raw response body and headers.
    pub async fn get_raw(&self, path: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();
        (status, headers, body)
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a multipart form. Files are `(field, filename, bytes)`.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        for (name, filename, data) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
