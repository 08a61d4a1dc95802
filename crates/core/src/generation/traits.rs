use async_trait::async_trait;

use super::{BackendError, GeneratedArtifacts, GenerationRequest};

/// A service able to render a report document.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Returns the name of this backend, used in logs and metrics.
    fn name(&self) -> &str;

    /// Render the primary document and, optionally, a preview.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedArtifacts, BackendError>;
}
