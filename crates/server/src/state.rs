use std::sync::Arc;

use fieldreport_core::{
    BacklogNotifier, Config, DocumentOrchestrator, FileLibrary, ObjectStore, ReportStore,
    SanitizedConfig, TicketIntake, TicketService,
};

/// Shared application state
pub struct AppState {
    config: Config,
    objects: Arc<ObjectStore>,
    tickets: Arc<TicketService>,
    reports: Arc<dyn ReportStore>,
    library: Arc<FileLibrary>,
    orchestrator: Arc<DocumentOrchestrator>,
    intake: Arc<TicketIntake>,
    notifier: Arc<BacklogNotifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        objects: Arc<ObjectStore>,
        tickets: Arc<TicketService>,
        reports: Arc<dyn ReportStore>,
        library: Arc<FileLibrary>,
        orchestrator: Arc<DocumentOrchestrator>,
        intake: Arc<TicketIntake>,
        notifier: Arc<BacklogNotifier>,
    ) -> Self {
        Self {
            config,
            objects,
            tickets,
            reports,
            library,
            orchestrator,
            intake,
            notifier,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn objects(&self) -> &ObjectStore {
        self.objects.as_ref()
    }

    pub fn ticket_service(&self) -> &TicketService {
        self.tickets.as_ref()
    }

    pub fn reports(&self) -> &dyn ReportStore {
        self.reports.as_ref()
    }

    pub fn library(&self) -> &FileLibrary {
        self.library.as_ref()
    }

    pub fn orchestrator(&self) -> &DocumentOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn intake(&self) -> &TicketIntake {
        self.intake.as_ref()
    }

    pub fn notifier(&self) -> &Arc<BacklogNotifier> {
        &self.notifier
    }
}
