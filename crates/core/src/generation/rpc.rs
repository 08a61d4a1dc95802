//! gRPC document generation microservice.
//!
//! The wire messages are declared directly with `prost` derives; the service
//! exposes a single unary `GenerateDocument` call.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
use tracing::debug;

use super::staging::staged_artifact;
use super::{
    Artifact, BackendError, GeneratedArtifacts, GenerationBackend, GenerationRequest,
};
use crate::storage::{validate_name, Prefix};

/// Fully qualified method path of the generator service.
pub const GENERATE_DOCUMENT_PATH: &str = "/docgen.DocumentGeneratorService/GenerateDocument";

/// Largest message accepted in either direction.
pub const MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChecklistItemMessage {
    #[prost(string, tag = "1")]
    pub task: String,
    #[prost(bool, tag = "2")]
    pub done: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenerateDocumentRequest {
    #[prost(string, tag = "1")]
    pub date: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(string, tag = "3")]
    pub machine_name: String,
    #[prost(string, tag = "4")]
    pub machine_number: String,
    #[prost(string, tag = "5")]
    pub inventory_number: String,
    #[prost(string, tag = "6")]
    pub classification: String,
    #[prost(string, tag = "7")]
    pub custom_class: String,
    #[prost(string, tag = "8")]
    pub material: String,
    #[prost(string, tag = "9")]
    pub recommendations: String,
    #[prost(string, tag = "10")]
    pub defects: String,
    #[prost(string, tag = "11")]
    pub additional_works: String,
    #[prost(string, tag = "12")]
    pub comments: String,
    #[prost(message, repeated, tag = "13")]
    pub checklist_items: Vec<ChecklistItemMessage>,
    #[prost(string, repeated, tag = "14")]
    pub photos: Vec<String>,
    #[prost(string, tag = "15")]
    pub first_name: String,
    #[prost(string, tag = "16")]
    pub last_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenerateDocumentResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub pdf_filename: String,
    #[prost(string, tag = "3")]
    pub preview_filename: String,
    #[prost(bytes = "vec", tag = "4")]
    pub pdf_content: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub preview_content: Vec<u8>,
    #[prost(string, tag = "6")]
    pub error_message: String,
}

impl From<&GenerationRequest> for GenerateDocumentRequest {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            date: request.date.clone(),
            address: request.address.clone(),
            machine_name: request.machine_name.clone(),
            machine_number: request.machine_number.clone(),
            inventory_number: request.inventory_number.clone(),
            classification: request.classification.clone(),
            custom_class: request.custom_class.clone(),
            material: request.material.clone(),
            recommendations: request.recommendations.clone(),
            defects: request.defects.clone(),
            additional_works: request.additional_works.clone(),
            comments: request.comments.clone(),
            checklist_items: request
                .checklist_items
                .iter()
                .map(|item| ChecklistItemMessage {
                    task: item.task.clone(),
                    done: item.done,
                })
                .collect(),
            photos: request.photos.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
        }
    }
}

pub struct RpcBackend {
    channel: Channel,
    address: String,
    staging_dir: PathBuf,
}

impl RpcBackend {
    /// Create a backend whose connection is established on first use.
    pub fn connect_lazy(
        address: &str,
        staging_dir: impl Into<PathBuf>,
    ) -> Result<Self, BackendError> {
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let endpoint =
            Endpoint::from_shared(uri.clone()).map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            channel: endpoint.connect_lazy(),
            address: uri,
            staging_dir: staging_dir.into(),
        })
    }

    fn artifacts(&self, response: GenerateDocumentResponse) -> Result<GeneratedArtifacts, BackendError> {
        if !response.success {
            return Err(BackendError::Rejected(response.error_message));
        }
        if response.pdf_filename.is_empty() {
            return Err(BackendError::InvalidOutput(
                "response carries no pdf file name".to_string(),
            ));
        }

        let primary = self.artifact(
            Prefix::Reports,
            &response.pdf_filename,
            response.pdf_content,
        )?;
        let preview = if response.preview_filename.is_empty() {
            None
        } else {
            Some(self.artifact(
                Prefix::Previews,
                &response.preview_filename,
                response.preview_content,
            )?)
        };

        Ok(GeneratedArtifacts { primary, preview })
    }

    /// Inline content wins; otherwise the file is expected in staging.
    fn artifact(&self, prefix: Prefix, name: &str, content: Vec<u8>) -> Result<Artifact, BackendError> {
        if content.is_empty() {
            return staged_artifact(&self.staging_dir, prefix, name);
        }
        validate_name(name).map_err(|e| BackendError::InvalidOutput(e.to_string()))?;
        Ok(Artifact::inline(name, Bytes::from(content)))
    }
}

fn status_to_error(status: tonic::Status) -> BackendError {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Unknown => {
            BackendError::Transport(status.to_string())
        }
        _ => BackendError::Rejected(status.message().to_string()),
    }
}

#[async_trait]
impl GenerationBackend for RpcBackend {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifacts, BackendError> {
        debug!(address = %self.address, "Calling generation microservice");

        let mut client = tonic::client::Grpc::new(self.channel.clone())
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);
        client
            .ready()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let codec: ProstCodec<GenerateDocumentRequest, GenerateDocumentResponse> =
            ProstCodec::default();
        let response = client
            .unary(
                tonic::Request::new(GenerateDocumentRequest::from(request)),
                PathAndQuery::from_static(GENERATE_DOCUMENT_PATH),
                codec,
            )
            .await
            .map_err(status_to_error)?
            .into_inner();

        self.artifacts(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ArtifactSource, ChecklistItem};
    use prost::Message;

    fn backend() -> RpcBackend {
        RpcBackend::connect_lazy("docgen:50051", "/tmp/staging").unwrap()
    }

    #[tokio::test]
    async fn test_address_without_scheme_gets_http() {
        assert_eq!(backend().address, "http://docgen:50051");
    }

    #[test]
    fn test_request_conversion_keeps_checklist() {
        let request = GenerationRequest {
            date: "2025-01-01".to_string(),
            address: "addr".to_string(),
            checklist_items: vec![ChecklistItem {
                task: "Проверка".to_string(),
                done: true,
            }],
            photos: vec!["p1.jpg".to_string()],
            ..Default::default()
        };

        let message = GenerateDocumentRequest::from(&request);
        let decoded = GenerateDocumentRequest::decode(message.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.checklist_items.len(), 1);
        assert!(decoded.checklist_items[0].done);
        assert_eq!(decoded.photos, vec!["p1.jpg"]);
    }

    #[tokio::test]
    async fn test_inline_content_is_used_directly() {
        let artifacts = backend()
            .artifacts(GenerateDocumentResponse {
                success: true,
                pdf_filename: "r.pdf".to_string(),
                preview_filename: "r.png".to_string(),
                pdf_content: b"%PDF".to_vec(),
                preview_content: Vec::new(),
                error_message: String::new(),
            })
            .unwrap();

        assert_eq!(
            artifacts.primary.source,
            ArtifactSource::Bytes(Bytes::from_static(b"%PDF"))
        );
        assert_eq!(
            artifacts.preview.unwrap().source,
            ArtifactSource::Staged(PathBuf::from("/tmp/staging/previews/r.png"))
        );
    }

    #[tokio::test]
    async fn test_unsuccessful_response_is_rejected() {
        let err = backend()
            .artifacts(GenerateDocumentResponse {
                success: false,
                error_message: "template missing".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(msg) if msg == "template missing"));
    }
}
