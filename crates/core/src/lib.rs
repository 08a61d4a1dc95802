pub mod config;
pub mod generation;
pub mod library;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod report;
pub mod storage;
pub mod testing;
pub mod ticket;

pub use config::{
    load_config, load_config_from_str, validate_config, BackendConfig, Config, ConfigError,
    SanitizedConfig,
};
pub use generation::{
    DocumentOrchestrator, GenerationBackend, GenerationError, GenerationRequest,
    GenerationResult, ReportUpload,
};
pub use library::{FileLibrary, FileRecord, FileStore, LibraryError, SqliteFileStore};
pub use notify::{BacklogNotifier, NotifyOutcome};
pub use queue::{TicketIntake, TicketQueue, TicketSubmission, TicketWorker};
pub use report::{ReportRecord, ReportStore, SqliteReportStore};
pub use storage::{ObjectStore, Prefix, StoreError};
pub use ticket::{SqliteTicketStore, Ticket, TicketService, TicketStatus, TicketStore};
