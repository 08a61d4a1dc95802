//! The object store used by the rest of the application.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    numbered_name, validate_name, LocalBackend, ObjectBackend, ObjectMetadata, ObjectSource,
    ObjectStream, Prefix, S3Backend, StoreError,
};
use crate::config::StorageConfig;
use crate::metrics::STORE_OPERATIONS;

/// Upper bound on `(n)` suffixes tried for one base name.
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

const DEFAULT_CACHE_SIZE: usize = 1024;

/// Which backend is active for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Local,
    Remote,
}

/// Single-backend object store with a dual-path read for older artifacts.
///
/// In remote mode the local directory is kept as a read and purge fallback
/// for objects written before the switch.
pub struct ObjectStore {
    active: Arc<dyn ObjectBackend>,
    legacy_local: Option<Arc<dyn ObjectBackend>>,
    mode: StorageMode,
    hits: Mutex<LruCache<(Prefix, String), ObjectSource>>,
}

impl ObjectStore {
    /// A store that only uses local (or local-like) storage.
    pub fn local(backend: Arc<dyn ObjectBackend>) -> Self {
        Self::build(backend, None, StorageMode::Local, DEFAULT_CACHE_SIZE)
    }

    /// A store writing to a remote backend, reading older objects from `legacy_local`.
    pub fn remote(remote: Arc<dyn ObjectBackend>, legacy_local: Arc<dyn ObjectBackend>) -> Self {
        Self::build(
            remote,
            Some(legacy_local),
            StorageMode::Remote,
            DEFAULT_CACHE_SIZE,
        )
    }

    /// Pick the mode from configuration.
    ///
    /// Remote mode requires a reachable bucket at startup; otherwise the
    /// store runs locally for the whole process lifetime.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let local: Arc<dyn ObjectBackend> = Arc::new(LocalBackend::new(&config.local_root));

        let Some(remote_config) = &config.remote else {
            info!(root = %config.local_root.display(), "Object storage running in local mode");
            return Self::build(local, None, StorageMode::Local, config.cache_size);
        };

        match S3Backend::connect(remote_config).await {
            Ok(remote) => {
                info!(bucket = %remote.bucket(), "Object storage running in remote mode");
                Self::build(
                    Arc::new(remote),
                    Some(local),
                    StorageMode::Remote,
                    config.cache_size,
                )
            }
            Err(e) => {
                warn!(error = %e, "Remote storage unavailable, falling back to local mode");
                Self::build(local, None, StorageMode::Local, config.cache_size)
            }
        }
    }

    fn build(
        active: Arc<dyn ObjectBackend>,
        legacy_local: Option<Arc<dyn ObjectBackend>>,
        mode: StorageMode,
        cache_size: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            active,
            legacy_local,
            mode,
            hits: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &str {
        self.active.name()
    }

    fn record<T>(&self, operation: &str, result: &Result<T, StoreError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) if e.is_not_found() => "not_found",
            Err(_) => "error",
        };
        STORE_OPERATIONS
            .with_label_values(&[self.active.name(), operation, outcome])
            .inc();
    }

    pub async fn exists(&self, prefix: Prefix, name: &str) -> Result<bool, StoreError> {
        let result = self.active.exists(prefix, name).await;
        self.record("exists", &result);
        result
    }

    pub async fn stat(&self, prefix: Prefix, name: &str) -> Result<ObjectMetadata, StoreError> {
        let result = self.active.stat(prefix, name).await;
        self.record("stat", &result);
        result
    }

    /// Write or overwrite an object in the active backend.
    pub async fn put(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let result = self.active.put(prefix, name, data, content_type).await;
        self.record("put", &result);
        result
    }

    /// Read from the active backend only. See [`ObjectStore::open_artifact`]
    /// for the local-then-remote read.
    pub async fn get(
        &self,
        prefix: Prefix,
        name: &str,
    ) -> Result<(ObjectStream, ObjectMetadata), StoreError> {
        let result = self.active.get(prefix, name).await;
        self.record("get", &result);
        result
    }

    /// Idempotent delete from the active backend.
    pub async fn delete(&self, prefix: Prefix, name: &str) -> Result<(), StoreError> {
        let result = self.active.delete(prefix, name).await;
        self.record("delete", &result);
        self.forget(prefix, name).await;
        result
    }

    pub async fn copy(
        &self,
        src_prefix: Prefix,
        src_name: &str,
        dst_prefix: Prefix,
        dst_name: &str,
    ) -> Result<(), StoreError> {
        let result = self
            .active
            .copy(src_prefix, src_name, dst_prefix, dst_name)
            .await;
        self.record("copy", &result);
        result
    }

    /// Copy then delete the source.
    pub async fn rename(&self, prefix: Prefix, from: &str, to: &str) -> Result<(), StoreError> {
        if from == to {
            return Ok(());
        }
        self.copy(prefix, from, prefix, to).await?;
        self.delete(prefix, from).await
    }

    pub async fn list(&self, prefix: Prefix) -> Result<Vec<String>, StoreError> {
        let result = self.active.list(prefix).await;
        self.record("list", &result);
        result
    }

    /// First free name for `base`: the base itself, then `stem(1).ext`, `stem(2).ext`, ...
    ///
    /// Not atomic against concurrent writers. Use [`ObjectStore::store_unique`]
    /// to claim the name together with the write.
    pub async fn unique_name(&self, prefix: Prefix, base: &str) -> Result<String, StoreError> {
        validate_name(base)?;
        for n in 0..=MAX_NAME_ATTEMPTS {
            let candidate = candidate_name(base, n);
            if !self.exists(prefix, &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(StoreError::NamesExhausted {
            base: base.to_string(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// Write `data` under the first free name derived from `base` and return it.
    ///
    /// Each candidate is claimed with a conditional put. When another writer
    /// claims it first, the next candidate is tried.
    pub async fn store_unique(
        &self,
        prefix: Prefix,
        base: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StoreError> {
        validate_name(base)?;
        for n in 0..=MAX_NAME_ATTEMPTS {
            let candidate = candidate_name(base, n);
            if self.exists(prefix, &candidate).await? {
                continue;
            }

            let result = self
                .active
                .put_if_absent(prefix, &candidate, data.clone(), content_type)
                .await;
            self.record("put", &result);
            if result? {
                debug!(prefix = %prefix, base, name = %candidate, "Stored object under unique name");
                return Ok(candidate);
            }
            debug!(prefix = %prefix, name = %candidate, "Name claimed concurrently, trying next");
        }
        Err(StoreError::NamesExhausted {
            base: base.to_string(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// Delete an object everywhere it may live: the active backend and, in
    /// remote mode, the legacy local directory.
    pub async fn purge(&self, prefix: Prefix, name: &str) -> Result<(), StoreError> {
        let active = self.active.delete(prefix, name).await;
        self.record("delete", &active);

        if let Some(local) = &self.legacy_local {
            if let Err(e) = local.delete(prefix, name).await {
                warn!(prefix = %prefix, name, error = %e, "Failed to purge legacy local copy");
            }
        }
        self.forget(prefix, name).await;
        active
    }

    /// Read an artifact that may have been written under either mode:
    /// local first, then remote. The backend that served a key is remembered
    /// and tried first next time.
    pub async fn open_artifact(
        &self,
        prefix: Prefix,
        name: &str,
    ) -> Result<(ObjectStream, ObjectMetadata, ObjectSource), StoreError> {
        validate_name(name)?;
        let key = (prefix, name.to_string());

        let remembered = self.hits.lock().await.get(&key).copied();
        let order = match remembered {
            Some(ObjectSource::Remote) => [ObjectSource::Remote, ObjectSource::Local],
            _ => [ObjectSource::Local, ObjectSource::Remote],
        };

        let mut last_error = None;
        for source in order {
            let Some(backend) = self.backend_for(source) else {
                continue;
            };
            match backend.get(prefix, name).await {
                Ok((stream, metadata)) => {
                    self.hits.lock().await.put(key, source);
                    return Ok((stream, metadata, source));
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(prefix = %prefix, name, backend = backend.name(), error = %e, "Artifact read failed");
                    last_error = Some(e);
                }
            }
        }

        self.hits.lock().await.pop(&key);
        Err(last_error.unwrap_or_else(|| StoreError::not_found(prefix, name)))
    }

    fn backend_for(&self, source: ObjectSource) -> Option<&Arc<dyn ObjectBackend>> {
        match (self.mode, source) {
            (StorageMode::Local, ObjectSource::Local) => Some(&self.active),
            (StorageMode::Local, ObjectSource::Remote) => None,
            (StorageMode::Remote, ObjectSource::Local) => self.legacy_local.as_ref(),
            (StorageMode::Remote, ObjectSource::Remote) => Some(&self.active),
        }
    }

    async fn forget(&self, prefix: Prefix, name: &str) {
        self.hits.lock().await.pop(&(prefix, name.to_string()));
    }
}

fn candidate_name(base: &str, n: u32) -> String {
    if n == 0 {
        base.to_string()
    } else {
        numbered_name(base, n)
    }
}
