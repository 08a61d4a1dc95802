//! Remote HTTP generation service.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::staging::staged_artifact;
use super::{BackendError, GeneratedArtifacts, GenerationBackend, GenerationRequest};
use crate::storage::Prefix;

/// POSTs the request as JSON and expects the names of the files it wrote
/// into the shared staging directory.
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    staging_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct HttpGenerateResponse {
    pdf: String,
    #[serde(default)]
    preview: Option<String>,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            staging_dir: staging_dir.into(),
        }
    }

    fn artifacts(&self, response: HttpGenerateResponse) -> Result<GeneratedArtifacts, BackendError> {
        let pdf = response.pdf.trim();
        if !pdf.ends_with(".pdf") {
            return Err(BackendError::InvalidOutput(format!(
                "expected a .pdf file name, got {:?}",
                pdf
            )));
        }

        let preview = match response.preview.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                Some(staged_artifact(&self.staging_dir, Prefix::Previews, name)?)
            }
            _ => None,
        };

        Ok(GeneratedArtifacts {
            primary: staged_artifact(&self.staging_dir, Prefix::Reports, pdf)?,
            preview,
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifacts, BackendError> {
        debug!(url = %self.url, "Requesting document from generation service");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!("HTTP {}: {}", status, error_text)));
        }

        let body: HttpGenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidOutput(e.to_string()))?;

        self.artifacts(body)
    }
}
