//! Ordered fallback across generation backends, persistence and linkage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::normalize::{normalize_request, ClassificationAliases};
use super::staging::{load_artifacts, read_artifact};
use super::{
    Artifact, BackendError, GeneratedArtifacts, GenerationBackend, GenerationError,
    GenerationRequest, GenerationResult, HttpBackend, RpcBackend, SubprocessBackend,
};
use crate::config::{BackendConfig, GenerationConfig};
use crate::metrics::{GENERATION_ATTEMPTS, GENERATION_DURATION, REPORTS_CREATED, REPORT_LINKS};
use crate::report::{LinkOutcome, NewReport, ReportRecord, ReportStore};
use crate::storage::{content_type_for, validate_name, ObjectStore, Prefix};
use crate::ticket::TicketStore;

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// A finished document supplied by the caller instead of a backend.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub filename: String,
    pub data: Bytes,
    pub date: String,
    pub address: String,
    pub classification: String,
    pub user_id: Option<i64>,
    pub ticket_id: Option<i64>,
}

/// Build backends in the configured priority order.
pub fn build_backends(
    config: &GenerationConfig,
) -> Result<Vec<Arc<dyn GenerationBackend>>, BackendError> {
    config
        .backends
        .iter()
        .map(|backend| -> Result<Arc<dyn GenerationBackend>, BackendError> {
            Ok(match backend {
                BackendConfig::Http { url } => {
                    Arc::new(HttpBackend::new(url.clone(), config.staging_dir.clone()))
                }
                BackendConfig::Grpc { address } => {
                    Arc::new(RpcBackend::connect_lazy(address, config.staging_dir.clone())?)
                }
                BackendConfig::Subprocess {
                    interpreters,
                    script,
                } => Arc::new(SubprocessBackend::new(
                    interpreters.clone(),
                    script.clone(),
                    config.staging_dir.clone(),
                )),
            })
        })
        .collect()
}

/// Turns generation requests into stored artifacts and report records.
///
/// Backends are tried one after another, each bounded by the attempt
/// timeout. Nothing is stored unless a backend succeeds, and a failure after
/// that point removes whatever was already written.
pub struct DocumentOrchestrator {
    backends: Vec<Arc<dyn GenerationBackend>>,
    objects: Arc<ObjectStore>,
    reports: Arc<dyn ReportStore>,
    tickets: Arc<dyn TicketStore>,
    aliases: ClassificationAliases,
    attempt_timeout: Duration,
}

impl DocumentOrchestrator {
    pub fn new(
        backends: Vec<Arc<dyn GenerationBackend>>,
        objects: Arc<ObjectStore>,
        reports: Arc<dyn ReportStore>,
        tickets: Arc<dyn TicketStore>,
    ) -> Self {
        Self {
            backends,
            objects,
            reports,
            tickets,
            aliases: ClassificationAliases::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn from_config(
        config: &GenerationConfig,
        objects: Arc<ObjectStore>,
        reports: Arc<dyn ReportStore>,
        tickets: Arc<dyn TicketStore>,
    ) -> Result<Self, BackendError> {
        let backends = build_backends(config)?;
        Ok(Self::new(backends, objects, reports, tickets)
            .with_aliases(ClassificationAliases::with_overrides(&config.aliases))
            .with_attempt_timeout(Duration::from_secs(config.timeout_secs)))
    }

    pub fn with_aliases(mut self, aliases: ClassificationAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Names of the configured backends, in priority order.
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn reports(&self) -> &Arc<dyn ReportStore> {
        &self.reports
    }

    /// Generate, store and record a report, then link it to a ticket.
    pub async fn generate_report(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let request = normalize_request(request, &self.aliases)?;
        if self.backends.is_empty() {
            return Err(GenerationError::NoBackends);
        }

        let (artifacts, backend) = self.run_backends(&request).await?;
        let (primary_name, preview_name) = self.persist(&artifacts).await?;

        let new_report = NewReport {
            filename: primary_name.clone(),
            preview_name: preview_name.clone(),
            date: request.date.clone(),
            address: request.address.clone(),
            user_id: request.user_id,
            classification: request.classification.clone(),
        };
        let report = self
            .record(new_report, &primary_name, preview_name.as_deref())
            .await?;
        REPORTS_CREATED.with_label_values(&["generated"]).inc();

        info!(
            report_id = report.id,
            filename = %primary_name,
            backend = %backend,
            "Report generated"
        );

        let linked_ticket = self.link(&report, request.ticket_id);
        Ok(GenerationResult {
            report,
            primary_name,
            preview_name,
            backend,
            linked_ticket,
            success: true,
        })
    }

    /// Store a finished document and record it like a generated one.
    pub async fn upload_report(
        &self,
        upload: ReportUpload,
    ) -> Result<GenerationResult, GenerationError> {
        validate_name(&upload.filename)?;
        if upload.data.is_empty() {
            return Err(GenerationError::Validation("file is empty".to_string()));
        }
        let normalized = normalize_request(
            GenerationRequest {
                date: upload.date,
                address: upload.address,
                classification: upload.classification,
                ..Default::default()
            },
            &self.aliases,
        )?;

        let primary_name = self
            .objects
            .store_unique(
                Prefix::Reports,
                &upload.filename,
                upload.data,
                content_type_for(&upload.filename),
            )
            .await
            .map_err(|e| GenerationError::Persistence(e.to_string()))?;

        let new_report = NewReport {
            filename: primary_name.clone(),
            preview_name: None,
            date: normalized.date,
            address: normalized.address,
            user_id: upload.user_id,
            classification: normalized.classification,
        };
        let report = self.record(new_report, &primary_name, None).await?;
        REPORTS_CREATED.with_label_values(&["uploaded"]).inc();
        info!(report_id = report.id, filename = %primary_name, "Report uploaded");

        let linked_ticket = self.link(&report, upload.ticket_id);
        Ok(GenerationResult {
            report,
            primary_name,
            preview_name: None,
            backend: "upload".to_string(),
            linked_ticket,
            success: true,
        })
    }

    /// Delete a report record, its links and its artifacts.
    pub async fn delete_report(&self, filename: &str) -> Result<ReportRecord, GenerationError> {
        let report = self
            .reports
            .find_by_filename(filename)?
            .ok_or_else(|| GenerationError::NotFound(format!("Report {}", filename)))?;
        let report = self.reports.delete(report.id)?;

        if let Err(e) = self.objects.purge(Prefix::Reports, &report.filename).await {
            warn!(filename = %report.filename, error = %e, "Failed to delete report document");
        }
        if let Some(preview) = &report.preview_name {
            if let Err(e) = self.objects.purge(Prefix::Previews, preview).await {
                warn!(preview = %preview, error = %e, "Failed to delete report preview");
            }
        }

        info!(report_id = report.id, filename = %report.filename, "Report deleted");
        Ok(report)
    }

    /// Link an existing report to an existing ticket.
    pub fn link_report(&self, report_id: i64, ticket_id: i64) -> Result<LinkOutcome, GenerationError> {
        self.reports
            .get(report_id)?
            .ok_or_else(|| GenerationError::NotFound(format!("Report {}", report_id)))?;
        self.tickets
            .get(ticket_id)?
            .ok_or_else(|| GenerationError::NotFound(format!("Ticket {}", ticket_id)))?;

        let outcome = self.reports.link_ticket(report_id, ticket_id)?;
        REPORT_LINKS.with_label_values(&["explicit"]).inc();
        Ok(outcome)
    }

    pub fn unlink_report(&self, report_id: i64, ticket_id: i64) -> Result<(), GenerationError> {
        if !self.reports.unlink_ticket(report_id, ticket_id)? {
            return Err(GenerationError::NotFound(format!(
                "Link between report {} and ticket {}",
                report_id, ticket_id
            )));
        }
        Ok(())
    }

    async fn run_backends(
        &self,
        request: &GenerationRequest,
    ) -> Result<(GeneratedArtifacts, String), GenerationError> {
        let mut last_error = String::new();

        for backend in &self.backends {
            let name = backend.name().to_string();
            debug!(backend = %name, "Trying generation backend");

            let started = Instant::now();
            let attempt = async {
                let artifacts = backend.generate(request).await?;
                load_artifacts(artifacts).await
            };
            let outcome = tokio::time::timeout(self.attempt_timeout, attempt).await;
            GENERATION_DURATION
                .with_label_values(&[&name])
                .observe(started.elapsed().as_secs_f64());

            let error = match outcome {
                Ok(Ok(artifacts)) => {
                    GENERATION_ATTEMPTS.with_label_values(&[&name, "success"]).inc();
                    return Ok((artifacts, name));
                }
                Ok(Err(e)) => {
                    GENERATION_ATTEMPTS.with_label_values(&[&name, "failed"]).inc();
                    e
                }
                Err(_) => {
                    GENERATION_ATTEMPTS.with_label_values(&[&name, "timeout"]).inc();
                    BackendError::Timeout {
                        secs: self.attempt_timeout.as_secs(),
                    }
                }
            };

            warn!(backend = %name, error = %error, "Generation backend failed, trying next");
            last_error = format!("{}: {}", name, error);
        }

        error!(attempts = self.backends.len(), "All generation backends failed");
        Err(GenerationError::AllBackendsFailed {
            attempts: self.backends.len(),
            last_error,
        })
    }

    /// Store primary and preview under unique names. A failed preview removes
    /// the primary again.
    async fn persist(
        &self,
        artifacts: &GeneratedArtifacts,
    ) -> Result<(String, Option<String>), GenerationError> {
        let primary_name = self.store_artifact(Prefix::Reports, &artifacts.primary).await?;

        let preview_name = match &artifacts.preview {
            None => None,
            Some(preview) => match self.store_artifact(Prefix::Previews, preview).await {
                Ok(name) => Some(name),
                Err(e) => {
                    self.discard(&primary_name, None).await;
                    return Err(e);
                }
            },
        };

        Ok((primary_name, preview_name))
    }

    async fn store_artifact(
        &self,
        prefix: Prefix,
        artifact: &Artifact,
    ) -> Result<String, GenerationError> {
        let data = read_artifact(artifact).await.map_err(|e| {
            GenerationError::Persistence(format!("cannot read artifact {}: {}", artifact.name, e))
        })?;
        let name = self
            .objects
            .store_unique(prefix, &artifact.name, data, content_type_for(&artifact.name))
            .await
            .map_err(|e| GenerationError::Persistence(e.to_string()))?;
        debug!(prefix = %prefix, name = %name, "Artifact stored");
        Ok(name)
    }

    /// Create the record, removing the stored artifacts if that fails.
    async fn record(
        &self,
        new_report: NewReport,
        primary_name: &str,
        preview_name: Option<&str>,
    ) -> Result<ReportRecord, GenerationError> {
        match self.reports.create(&new_report) {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(filename = %primary_name, error = %e, "Failed to record report, removing artifacts");
                self.discard(primary_name, preview_name).await;
                Err(GenerationError::Persistence(e.to_string()))
            }
        }
    }

    async fn discard(&self, primary_name: &str, preview_name: Option<&str>) {
        if let Err(e) = self.objects.delete(Prefix::Reports, primary_name).await {
            warn!(name = %primary_name, error = %e, "Failed to remove orphaned document");
        }
        if let Some(preview) = preview_name {
            if let Err(e) = self.objects.delete(Prefix::Previews, preview).await {
                warn!(name = %preview, error = %e, "Failed to remove orphaned preview");
            }
        }
    }

    /// Best-effort linkage. Failures are logged and never returned.
    fn link(&self, report: &ReportRecord, explicit: Option<i64>) -> Option<i64> {
        let (ticket_id, mode) = match explicit {
            Some(ticket_id) => match self.tickets.get(ticket_id) {
                Ok(Some(_)) => (ticket_id, "explicit"),
                Ok(None) => {
                    warn!(report_id = report.id, ticket_id, "Requested ticket does not exist, report left unlinked");
                    REPORT_LINKS.with_label_values(&["failed"]).inc();
                    return None;
                }
                Err(e) => {
                    warn!(report_id = report.id, ticket_id, error = %e, "Ticket lookup failed");
                    REPORT_LINKS.with_label_values(&["failed"]).inc();
                    return None;
                }
            },
            None => match self.tickets.find_latest_open_by_address(&report.address) {
                Ok(Some(ticket)) => (ticket.id, "auto"),
                Ok(None) => {
                    debug!(report_id = report.id, address = %report.address, "No ticket to auto-link");
                    REPORT_LINKS.with_label_values(&["no_candidate"]).inc();
                    return None;
                }
                Err(e) => {
                    warn!(report_id = report.id, error = %e, "Auto-link lookup failed");
                    REPORT_LINKS.with_label_values(&["failed"]).inc();
                    return None;
                }
            },
        };

        match self.reports.link_ticket(report.id, ticket_id) {
            Ok(_) => {
                REPORT_LINKS.with_label_values(&[mode]).inc();
                info!(report_id = report.id, ticket_id, mode, "Report linked to ticket");
                Some(ticket_id)
            }
            Err(e) => {
                warn!(report_id = report.id, ticket_id, error = %e, "Failed to link report");
                REPORT_LINKS.with_label_values(&["failed"]).inc();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportFilter, SqliteReportStore};
    use crate::testing::{fixtures, MemoryObjectBackend, MockBehavior, MockGenerationBackend};
    use crate::ticket::SqliteTicketStore;

    struct Harness {
        objects: Arc<MemoryObjectBackend>,
        reports: Arc<SqliteReportStore>,
        tickets: Arc<SqliteTicketStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                objects: Arc::new(MemoryObjectBackend::new("local")),
                reports: Arc::new(SqliteReportStore::in_memory().unwrap()),
                tickets: Arc::new(SqliteTicketStore::in_memory().unwrap()),
            }
        }

        fn orchestrator(&self, backends: Vec<Arc<dyn GenerationBackend>>) -> DocumentOrchestrator {
            DocumentOrchestrator::new(
                backends,
                Arc::new(ObjectStore::local(self.objects.clone())),
                self.reports.clone(),
                self.tickets.clone(),
            )
            .with_attempt_timeout(Duration::from_millis(200))
        }
    }

    #[tokio::test]
    async fn test_first_backend_success() {
        let h = Harness::new();
        let backend = Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"));
        let orchestrator = h.orchestrator(vec![backend.clone()]);

        let result = orchestrator
            .generate_report(fixtures::generation_request("ул. Ленина, 1"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.primary_name, "r.pdf");
        assert_eq!(result.preview_name.as_deref(), Some("r.png"));
        assert_eq!(result.backend, "grpc");
        assert!(h.objects.contains(Prefix::Reports, "r.pdf").await);
        assert!(h.objects.contains(Prefix::Previews, "r.png").await);
        assert_eq!(h.reports.find_by_filename("r.pdf").unwrap().unwrap().id, result.report.id);
    }

    #[tokio::test]
    async fn test_classification_normalized_once_for_all_backends() {
        let h = Harness::new();
        let first = Arc::new(MockGenerationBackend::failing("http"));
        let second = Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"));
        let orchestrator = h.orchestrator(vec![first.clone(), second.clone()]);

        let mut request = fixtures::generation_request("addr");
        request.classification = "Аварийный вызов".to_string();
        let result = orchestrator.generate_report(request).await.unwrap();

        assert_eq!(first.requests().await[0].classification, "АВ");
        assert_eq!(second.requests().await[0].classification, "АВ");
        assert_eq!(result.report.classification, "АВ");
    }

    #[tokio::test]
    async fn test_existing_name_gets_suffix() {
        let h = Harness::new();
        h.objects.insert(Prefix::Reports, "r.pdf", b"older").await;
        let orchestrator =
            h.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);

        let result = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();

        assert_eq!(result.primary_name, "r(1).pdf");
        assert_eq!(h.objects.object(Prefix::Reports, "r.pdf").await.unwrap(), b"older");
    }

    #[tokio::test]
    async fn test_validation_error_touches_nothing() {
        let h = Harness::new();
        let backend = Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"));
        let orchestrator = h.orchestrator(vec![backend.clone()]);

        let mut request = fixtures::generation_request("addr");
        request.date = String::new();
        let err = orchestrator.generate_report(request).await.unwrap_err();

        assert!(matches!(err, GenerationError::Validation(_)));
        assert_eq!(backend.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_backends() {
        let h = Harness::new();
        let err = h
            .orchestrator(vec![])
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoBackends));
    }

    #[tokio::test]
    async fn test_store_failure_leaves_nothing_behind() {
        let h = Harness::new();
        let orchestrator =
            h.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);

        h.objects.set_fail_writes(true).await;
        let err = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Persistence(_)));
        assert!(h.objects.is_empty().await);
        assert!(h.reports.list(&ReportFilter::new()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_backends_failing() {
        let h = Harness::new();
        let first = Arc::new(MockGenerationBackend::failing("grpc"));
        let second = Arc::new(MockGenerationBackend::hanging("http"));
        let orchestrator = h.orchestrator(vec![first.clone(), second.clone()]);

        let err = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap_err();

        match err {
            GenerationError::AllBackendsFailed { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.starts_with("http"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(first.call_count().await, 1);
        assert_eq!(second.call_count().await, 1);
        assert!(h.objects.is_empty().await);
    }

    #[tokio::test]
    async fn test_unreadable_staged_output_falls_through() {
        let h = Harness::new();
        let dir = tempfile::TempDir::new().unwrap();
        let first = Arc::new(MockGenerationBackend::new(
            "http",
            MockBehavior::Staged {
                primary: "r.pdf".to_string(),
                path: dir.path().join("reports/r.pdf"),
            },
        ));
        let second = Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"));
        let orchestrator = h.orchestrator(vec![first.clone(), second.clone()]);

        let result = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();

        assert_eq!(result.backend, "grpc");
        assert_eq!(first.call_count().await, 1);
        assert_eq!(second.call_count().await, 1);
        assert_eq!(result.primary_name, "r.pdf");
    }

    #[tokio::test]
    async fn test_staged_output_is_stored_and_cleaned_up() {
        let h = Harness::new();
        let dir = tempfile::TempDir::new().unwrap();
        let staged = dir.path().join("r.pdf");
        std::fs::write(&staged, b"%PDF-staged").unwrap();
        let backend = Arc::new(MockGenerationBackend::new(
            "subprocess",
            MockBehavior::Staged {
                primary: "r.pdf".to_string(),
                path: staged.clone(),
            },
        ));
        let orchestrator = h.orchestrator(vec![backend]);

        let result = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();

        assert_eq!(result.preview_name, None);
        assert_eq!(h.objects.object(Prefix::Reports, "r.pdf").await.unwrap(), b"%PDF-staged");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_explicit_link() {
        let h = Harness::new();
        let ticket = h
            .tickets
            .insert(&fixtures::ticket_message("s1", "elsewhere"))
            .unwrap()
            .ticket()
            .clone();
        let orchestrator =
            h.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);

        let mut request = fixtures::generation_request("addr");
        request.ticket_id = Some(ticket.id);
        let result = orchestrator.generate_report(request).await.unwrap();

        assert_eq!(result.linked_ticket, Some(ticket.id));
        assert_eq!(h.reports.reports_for_ticket(ticket.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_link_to_missing_ticket_still_succeeds() {
        let h = Harness::new();
        let orchestrator =
            h.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);

        let mut request = fixtures::generation_request("addr");
        request.ticket_id = Some(404);
        let result = orchestrator.generate_report(request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.linked_ticket, None);
    }

    #[tokio::test]
    async fn test_delete_report_removes_artifacts_and_links() {
        let h = Harness::new();
        let ticket = h
            .tickets
            .insert(&fixtures::ticket_message("s1", "addr"))
            .unwrap()
            .ticket()
            .clone();
        let orchestrator =
            h.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);
        let result = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();
        assert_eq!(result.linked_ticket, Some(ticket.id));

        orchestrator.delete_report("r.pdf").await.unwrap();

        assert!(!h.objects.contains(Prefix::Reports, "r.pdf").await);
        assert!(!h.objects.contains(Prefix::Previews, "r.png").await);
        assert!(h.reports.reports_for_ticket(ticket.id).unwrap().is_empty());
        assert!(matches!(
            orchestrator.delete_report("r.pdf").await,
            Err(GenerationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_report_without_preview_keeps_other_previews() {
        let h = Harness::new();
        let backend = Arc::new(MockGenerationBackend::new(
            "grpc",
            MockBehavior::SucceedWithoutPreview {
                primary: "r.pdf".to_string(),
            },
        ));
        let orchestrator = h.orchestrator(vec![backend.clone()]);

        let first = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();
        assert_eq!(first.preview_name, None);

        backend
            .set_behavior(MockBehavior::Succeed {
                primary: "r.pdf".to_string(),
            })
            .await;
        let second = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();
        assert_eq!(second.primary_name, "r(1).pdf");
        assert_eq!(second.preview_name.as_deref(), Some("r.png"));

        orchestrator.delete_report("r.pdf").await.unwrap();

        assert!(!h.objects.contains(Prefix::Reports, "r.pdf").await);
        assert!(h.objects.contains(Prefix::Reports, "r(1).pdf").await);
        assert!(h.objects.contains(Prefix::Previews, "r.png").await);
    }

    #[tokio::test]
    async fn test_upload_report_is_linked_by_address() {
        let h = Harness::new();
        let ticket = h
            .tickets
            .insert(&fixtures::ticket_message("s1", "ул. Мира, 1"))
            .unwrap()
            .ticket()
            .clone();
        let orchestrator = h.orchestrator(vec![]);

        let result = orchestrator
            .upload_report(ReportUpload {
                filename: "scan.pdf".to_string(),
                data: Bytes::from_static(b"%PDF-scan"),
                date: "2025-03-03".to_string(),
                address: "ул. Мира, 1".to_string(),
                classification: String::new(),
                user_id: Some(2),
                ticket_id: None,
            })
            .await
            .unwrap();

        assert_eq!(result.backend, "upload");
        assert_eq!(result.linked_ticket, Some(ticket.id));
        assert_eq!(result.report.classification, crate::report::DEFAULT_CLASSIFICATION);
        assert!(h.objects.contains(Prefix::Reports, "scan.pdf").await);
    }

    #[tokio::test]
    async fn test_link_and_unlink_report() {
        let h = Harness::new();
        let ticket = h
            .tickets
            .insert(&fixtures::ticket_message("s1", "other"))
            .unwrap()
            .ticket()
            .clone();
        let orchestrator =
            h.orchestrator(vec![Arc::new(MockGenerationBackend::succeeding("grpc", "r.pdf"))]);
        let result = orchestrator
            .generate_report(fixtures::generation_request("addr"))
            .await
            .unwrap();
        assert_eq!(result.linked_ticket, None);

        assert_eq!(
            orchestrator.link_report(result.report.id, ticket.id).unwrap(),
            LinkOutcome::Linked
        );
        assert_eq!(
            orchestrator.link_report(result.report.id, ticket.id).unwrap(),
            LinkOutcome::AlreadyLinked
        );
        assert!(matches!(
            orchestrator.link_report(result.report.id, 999),
            Err(GenerationError::NotFound(_))
        ));

        orchestrator.unlink_report(result.report.id, ticket.id).unwrap();
        assert!(orchestrator.unlink_report(result.report.id, ticket.id).is_err());
    }
}
