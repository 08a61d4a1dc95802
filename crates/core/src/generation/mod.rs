//! Report document generation.
//!
//! A request is normalized once and handed to an ordered list of backends
//! (gRPC service, HTTP service, local script). The first success is stored
//! in the object store and recorded as a report.

mod error;
mod http;
mod normalize;
mod orchestrator;
mod rpc;
mod staging;
mod subprocess;
mod traits;
mod types;

pub use error::{BackendError, GenerationError};
pub use http::HttpBackend;
pub use normalize::{normalize_request, ClassificationAliases};
pub use orchestrator::{build_backends, DocumentOrchestrator, ReportUpload};
pub use rpc::{
    ChecklistItemMessage, GenerateDocumentRequest, GenerateDocumentResponse, RpcBackend,
    GENERATE_DOCUMENT_PATH, MAX_MESSAGE_SIZE,
};
pub use staging::{load_artifacts, read_artifact, remove_staged, staged_artifact, staged_path};
pub use subprocess::{parse_generator_output, SubprocessBackend};
pub use traits::GenerationBackend;
pub use types::{
    Artifact, ArtifactSource, ChecklistItem, GeneratedArtifacts, GenerationRequest,
    GenerationResult,
};
