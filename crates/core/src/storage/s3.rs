//! S3-compatible object backend.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::{
    content_type_for, validate_name, ObjectBackend, ObjectMetadata, ObjectStream, Prefix,
    StoreError,
};
use crate::config::RemoteStorageConfig;

const PRECONDITION_FAILED: u16 = 412;

/// Objects live in a single bucket under `<prefix>/<name>` keys.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Build a client from static credentials and make sure the bucket exists.
    pub async fn connect(config: &RemoteStorageConfig) -> Result<Self, StoreError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if !config.access_key.is_empty() && !config.secret_key.is_empty() {
            let credentials = Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "StaticCredentialsProvider",
            );
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(config.force_path_style)
            .build();

        let backend = Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        };
        backend.ensure_bucket(&config.region).await?;

        info!(
            endpoint = %config.endpoint,
            bucket = %config.bucket,
            "Connected to remote object storage"
        );
        Ok(backend)
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_bucket(&self, region: &str) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => return Ok(()),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => {}
            Err(e) => {
                return Err(StoreError::BackendUnavailable(format!(
                    "bucket {} is not reachable: {}",
                    self.bucket,
                    DisplayErrorContext(e)
                )))
            }
        }

        warn!(bucket = %self.bucket, "Bucket does not exist, creating it");
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request.send().await.map_err(|e| {
            StoreError::BackendUnavailable(format!(
                "failed to create bucket {}: {}",
                self.bucket,
                DisplayErrorContext(e)
            ))
        })?;
        Ok(())
    }

    fn key(prefix: Prefix, name: &str) -> Result<String, StoreError> {
        validate_name(name)?;
        Ok(format!("{}{}", prefix.as_str(), name))
    }
}

/// Network-level failures mean the backend is unavailable; everything else is
/// an error reported by the service.
fn map_sdk<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StoreError::BackendUnavailable(DisplayErrorContext(err).to_string())
        }
        _ => StoreError::Remote(DisplayErrorContext(err).to_string()),
    }
}

fn trim_etag(etag: Option<&str>) -> Option<String> {
    etag.map(|e| e.trim_matches('"').to_string())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn name(&self) -> &str {
        "s3"
    }

    async fn exists(&self, prefix: Prefix, name: &str) -> Result<bool, StoreError> {
        match self.stat(prefix, name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn stat(&self, prefix: Prefix, name: &str) -> Result<ObjectMetadata, StoreError> {
        let key = Self::key(prefix, name)?;
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(ref se) if se.err().is_not_found() => {
                    StoreError::not_found(prefix, name)
                }
                other => map_sdk(other),
            })?;

        Ok(ObjectMetadata {
            size: head.content_length().unwrap_or(0).max(0) as u64,
            content_type: head
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| content_type_for(name).to_string()),
            etag: trim_etag(head.e_tag()),
        })
    }

    async fn put(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let key = Self::key(prefix, name)?;
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(map_sdk)?;

        debug!(key = %key, size, "Uploaded object");
        Ok(())
    }

    async fn put_if_absent(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<bool, StoreError> {
        let key = Self::key(prefix, name)?;
        let size = data.len();
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .content_length(size as i64)
            .if_none_match("*")
            .body(ByteStream::from(data))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(key = %key, size, "Claimed object");
                Ok(true)
            }
            Err(e) if e.raw_response().map(|r| r.status().as_u16()) == Some(PRECONDITION_FAILED) => {
                Ok(false)
            }
            Err(e) => Err(map_sdk(e)),
        }
    }

    async fn get(
        &self,
        prefix: Prefix,
        name: &str,
    ) -> Result<(ObjectStream, ObjectMetadata), StoreError> {
        let key = Self::key(prefix, name)?;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(ref se) if se.err().is_no_such_key() => {
                    StoreError::not_found(prefix, name)
                }
                other => map_sdk(other),
            })?;

        let metadata = ObjectMetadata {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            content_type: response
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| content_type_for(name).to_string()),
            etag: trim_etag(response.e_tag()),
        };
        let stream: ObjectStream = Box::pin(response.body.into_async_read());
        Ok((stream, metadata))
    }

    async fn delete(&self, prefix: Prefix, name: &str) -> Result<(), StoreError> {
        let key = Self::key(prefix, name)?;
        // S3 deletes are already idempotent
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(map_sdk)?;
        Ok(())
    }

    async fn copy(
        &self,
        src_prefix: Prefix,
        src_name: &str,
        dst_prefix: Prefix,
        dst_name: &str,
    ) -> Result<(), StoreError> {
        let src_key = Self::key(src_prefix, src_name)?;
        let dst_key = Self::key(dst_prefix, dst_name)?;
        let source = format!(
            "{}/{}{}",
            self.bucket,
            src_prefix.as_str(),
            urlencoding::encode(src_name)
        );

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&dst_key)
            .copy_source(source)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(ref se) if se.err().code() == Some("NoSuchKey") => {
                    StoreError::not_found(src_prefix, src_name)
                }
                other => map_sdk(other),
            })?;

        debug!(from = %src_key, to = %dst_key, "Copied object");
        Ok(())
    }

    async fn list(&self, prefix: Prefix) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix.as_str())
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(map_sdk)?;

            for object in page.contents() {
                if let Some(name) = object.key().and_then(|k| k.strip_prefix(prefix.as_str())) {
                    if !name.is_empty() && !name.contains('/') {
                        names.push(name.to_string());
                    }
                }
            }

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            S3Backend::key(Prefix::Previews, "r(1).png").unwrap(),
            "previews/r(1).png"
        );
        assert!(S3Backend::key(Prefix::Files, "a/b").is_err());
    }

    #[test]
    fn test_trim_etag() {
        assert_eq!(
            trim_etag(Some("\"9e107d9d372bb6826bd81d3542a419d6\"")),
            Some("9e107d9d372bb6826bd81d3542a419d6".to_string())
        );
        assert_eq!(trim_etag(None), None);
    }
}
