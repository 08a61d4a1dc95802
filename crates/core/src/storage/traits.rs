//! Trait definitions for object backends.

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectMetadata, ObjectStream, Prefix, StoreError};

/// A key/value binary store keyed by `(prefix, name)`.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// True iff a live object exists under the key.
    async fn exists(&self, prefix: Prefix, name: &str) -> Result<bool, StoreError>;

    /// Metadata of an object without its body.
    async fn stat(&self, prefix: Prefix, name: &str) -> Result<ObjectMetadata, StoreError>;

    /// Write or overwrite an object.
    async fn put(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Write an object only if the key is free. Returns false if it was taken.
    ///
    /// The default implementation checks then writes and is not atomic.
    async fn put_if_absent(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<bool, StoreError> {
        if self.exists(prefix, name).await? {
            return Ok(false);
        }
        self.put(prefix, name, data, content_type).await?;
        Ok(true)
    }

    /// Open an object for reading.
    async fn get(
        &self,
        prefix: Prefix,
        name: &str,
    ) -> Result<(ObjectStream, ObjectMetadata), StoreError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, prefix: Prefix, name: &str) -> Result<(), StoreError>;

    /// Copy an object inside this backend.
    async fn copy(
        &self,
        src_prefix: Prefix,
        src_name: &str,
        dst_prefix: Prefix,
        dst_name: &str,
    ) -> Result<(), StoreError>;

    /// Names of every object under a prefix.
    async fn list(&self, prefix: Prefix) -> Result<Vec<String>, StoreError>;
}
