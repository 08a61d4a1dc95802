//! Mock generation backend for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::generation::{
    Artifact, BackendError, GeneratedArtifacts, GenerationBackend, GenerationRequest,
};
use crate::storage::split_extension;

/// How the mock answers `generate`.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return inline artifacts named `primary` and `<stem>.png`.
    Succeed { primary: String },
    /// Return inline primary only.
    SucceedWithoutPreview { primary: String },
    /// Report a primary written to the staging directory at `path`.
    Staged { primary: String, path: PathBuf },
    /// Fail with a transport error.
    Fail,
    /// Never answer; only an outer timeout ends the attempt.
    Hang,
}

/// Mock implementation of the GenerationBackend trait.
///
/// Records every request it receives so tests can assert on what each
/// backend was asked for.
#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    name: String,
    behavior: Arc<RwLock<MockBehavior>>,
    requests: Arc<RwLock<Vec<GenerationRequest>>>,
}

impl MockGenerationBackend {
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior: Arc::new(RwLock::new(behavior)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn succeeding(name: impl Into<String>, primary: &str) -> Self {
        Self::new(
            name,
            MockBehavior::Succeed {
                primary: primary.to_string(),
            },
        )
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Fail)
    }

    pub fn hanging(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Hang)
    }

    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

fn primary_artifact(name: &str) -> Artifact {
    Artifact::inline(name, Bytes::from(format!("%PDF-1.4 {}", name)))
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifacts, BackendError> {
        self.requests.write().await.push(request.clone());
        let behavior = self.behavior.read().await.clone();

        match behavior {
            MockBehavior::Succeed { primary } => {
                let (stem, _) = split_extension(&primary);
                let preview = format!("{}.png", stem);
                Ok(GeneratedArtifacts {
                    primary: primary_artifact(&primary),
                    preview: Some(Artifact::inline(
                        preview,
                        Bytes::from_static(b"\x89PNG mock"),
                    )),
                })
            }
            MockBehavior::SucceedWithoutPreview { primary } => Ok(GeneratedArtifacts {
                primary: primary_artifact(&primary),
                preview: None,
            }),
            MockBehavior::Staged { primary, path } => Ok(GeneratedArtifacts {
                primary: Artifact::staged(primary, path),
                preview: None,
            }),
            MockBehavior::Fail => Err(BackendError::Transport(format!(
                "{} is unreachable",
                self.name
            ))),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::Timeout { secs: 3600 })
            }
        }
    }
}
