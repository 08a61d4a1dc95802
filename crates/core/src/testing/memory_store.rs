//! In-memory object backend for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{
    content_type_for, validate_name, ObjectBackend, ObjectMetadata, ObjectStream, Prefix,
    StoreError,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Object backend keeping everything in a map.
///
/// Provides controllable behavior for testing:
/// - Inspect stored objects
/// - Simulate an unreachable backend
/// - Fail writes only, to exercise cleanup paths
///
/// `put_if_absent` is atomic, like the real backends.
#[derive(Debug, Clone)]
pub struct MemoryObjectBackend {
    name: String,
    objects: Arc<RwLock<HashMap<(Prefix, String), StoredObject>>>,
    unavailable: Arc<RwLock<bool>>,
    fail_writes: Arc<RwLock<bool>>,
}

impl Default for MemoryObjectBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryObjectBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            unavailable: Arc::new(RwLock::new(false)),
            fail_writes: Arc::new(RwLock::new(false)),
        }
    }

    /// Seed an object directly, bypassing failure toggles.
    pub async fn insert(&self, prefix: Prefix, name: &str, data: &[u8]) {
        self.objects.write().await.insert(
            (prefix, name.to_string()),
            StoredObject {
                data: Bytes::copy_from_slice(data),
                content_type: content_type_for(name).to_string(),
            },
        );
    }

    pub async fn contains(&self, prefix: Prefix, name: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(prefix, name.to_string()))
    }

    /// Raw bytes of an object.
    pub async fn object(&self, prefix: Prefix, name: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(prefix, name.to_string()))
            .map(|o| o.data.to_vec())
    }

    /// Content type an object was stored with.
    pub async fn content_type(&self, prefix: Prefix, name: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&(prefix, name.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// Sorted names stored under a prefix.
    pub async fn names(&self, prefix: Prefix) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(p, _)| *p == prefix)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Total number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Make every operation fail with `BackendUnavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Make puts fail while reads and deletes keep working.
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        if *self.unavailable.read().await {
            return Err(StoreError::BackendUnavailable(format!(
                "{} is unavailable",
                self.name
            )));
        }
        Ok(())
    }

    async fn check_writable(&self) -> Result<(), StoreError> {
        self.check_available().await?;
        if *self.fail_writes.read().await {
            return Err(StoreError::Remote(format!("{} rejected the write", self.name)));
        }
        Ok(())
    }

    fn metadata(object: &StoredObject) -> ObjectMetadata {
        ObjectMetadata {
            size: object.data.len() as u64,
            content_type: object.content_type.clone(),
            etag: Some(format!("{:x}", md5::compute(&object.data))),
        }
    }
}

#[async_trait]
impl ObjectBackend for MemoryObjectBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, prefix: Prefix, name: &str) -> Result<bool, StoreError> {
        validate_name(name)?;
        self.check_available().await?;
        Ok(self.contains(prefix, name).await)
    }

    async fn stat(&self, prefix: Prefix, name: &str) -> Result<ObjectMetadata, StoreError> {
        validate_name(name)?;
        self.check_available().await?;
        self.objects
            .read()
            .await
            .get(&(prefix, name.to_string()))
            .map(Self::metadata)
            .ok_or_else(|| StoreError::not_found(prefix, name))
    }

    async fn put(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        validate_name(name)?;
        self.check_writable().await?;
        self.objects.write().await.insert(
            (prefix, name.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn put_if_absent(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<bool, StoreError> {
        validate_name(name)?;
        self.check_writable().await?;
        let mut objects = self.objects.write().await;
        let key = (prefix, name.to_string());
        if objects.contains_key(&key) {
            return Ok(false);
        }
        objects.insert(
            key,
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(true)
    }

    async fn get(
        &self,
        prefix: Prefix,
        name: &str,
    ) -> Result<(ObjectStream, ObjectMetadata), StoreError> {
        validate_name(name)?;
        self.check_available().await?;
        let objects = self.objects.read().await;
        let object = objects
            .get(&(prefix, name.to_string()))
            .ok_or_else(|| StoreError::not_found(prefix, name))?;
        let stream: ObjectStream = Box::pin(Cursor::new(object.data.clone()));
        Ok((stream, Self::metadata(object)))
    }

    async fn delete(&self, prefix: Prefix, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        self.check_available().await?;
        self.objects.write().await.remove(&(prefix, name.to_string()));
        Ok(())
    }

    async fn copy(
        &self,
        src_prefix: Prefix,
        src_name: &str,
        dst_prefix: Prefix,
        dst_name: &str,
    ) -> Result<(), StoreError> {
        validate_name(src_name)?;
        validate_name(dst_name)?;
        self.check_writable().await?;
        let mut objects = self.objects.write().await;
        let object = objects
            .get(&(src_prefix, src_name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(src_prefix, src_name))?;
        objects.insert((dst_prefix, dst_name.to_string()), object);
        Ok(())
    }

    async fn list(&self, prefix: Prefix) -> Result<Vec<String>, StoreError> {
        self.check_available().await?;
        Ok(self.names(prefix).await)
    }
}
