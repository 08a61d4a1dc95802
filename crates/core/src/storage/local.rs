//! Filesystem object backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{
    content_type_for, validate_name, ObjectBackend, ObjectMetadata, ObjectStream, Prefix,
    StoreError,
};

/// Temp files live here while a write is in flight.
const TEMP_DIR: &str = ".tmp";
/// Content types that differ from the one implied by the extension.
const TYPES_DIR: &str = ".content-types";

/// Stores objects as `<root>/<prefix dir>/<name>`.
///
/// Writes go through a temp file under `<root>/.tmp` and a rename so readers
/// never see a partially written object. A content type that the extension
/// does not imply is kept in `<root>/.content-types/<prefix dir>/<name>`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an object.
    pub fn path_for(&self, prefix: Prefix, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(prefix.dir_name()).join(name))
    }

    async fn temp_path(&self) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(TEMP_DIR);
        fs::create_dir_all(&dir).await?;
        Ok(dir.join(uuid::Uuid::new_v4().simple().to_string()))
    }

    async fn ensure_dir(&self, prefix: Prefix) -> Result<(), StoreError> {
        fs::create_dir_all(self.root.join(prefix.dir_name())).await?;
        Ok(())
    }

    fn type_path(&self, prefix: Prefix, name: &str) -> PathBuf {
        self.root.join(TYPES_DIR).join(prefix.dir_name()).join(name)
    }

    async fn write_content_type(
        &self,
        prefix: Prefix,
        name: &str,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.type_path(prefix, name);
        if content_type.is_empty() || content_type == content_type_for(name) {
            return remove_if_present(&path).await;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content_type).await?;
        Ok(())
    }

    async fn content_type_of(&self, prefix: Prefix, name: &str) -> String {
        match fs::read_to_string(self.type_path(prefix, name)).await {
            Ok(stored) if !stored.trim().is_empty() => stored.trim().to_string(),
            _ => content_type_for(name).to_string(),
        }
    }

    fn map_missing(err: std::io::Error, prefix: Prefix, name: &str) -> StoreError {
        if err.kind() == ErrorKind::NotFound {
            StoreError::not_found(prefix, name)
        } else {
            StoreError::Io(err)
        }
    }
}

#[async_trait]
impl ObjectBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn exists(&self, prefix: Prefix, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(prefix, name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn stat(&self, prefix: Prefix, name: &str) -> Result<ObjectMetadata, StoreError> {
        let path = self.path_for(prefix, name)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| Self::map_missing(e, prefix, name))?;
        if !meta.is_file() {
            return Err(StoreError::not_found(prefix, name));
        }
        Ok(ObjectMetadata {
            size: meta.len(),
            content_type: self.content_type_of(prefix, name).await,
            etag: None,
        })
    }

    async fn put(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.path_for(prefix, name)?;
        self.ensure_dir(prefix).await?;

        let tmp = self.temp_path().await?;
        if let Err(e) = fs::write(&tmp, &data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }
        self.write_content_type(prefix, name, content_type).await?;

        debug!(prefix = %prefix, name, size = data.len(), "Stored local object");
        Ok(())
    }

    async fn put_if_absent(
        &self,
        prefix: Prefix,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<bool, StoreError> {
        let path = self.path_for(prefix, name)?;
        self.ensure_dir(prefix).await?;

        // create_new makes the name claim atomic
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let written = async {
            file.write_all(&data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(StoreError::Io(e));
        }
        self.write_content_type(prefix, name, content_type).await?;

        debug!(prefix = %prefix, name, size = data.len(), "Claimed local object");
        Ok(true)
    }

    async fn get(
        &self,
        prefix: Prefix,
        name: &str,
    ) -> Result<(ObjectStream, ObjectMetadata), StoreError> {
        let path = self.path_for(prefix, name)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::map_missing(e, prefix, name))?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StoreError::not_found(prefix, name));
        }

        let metadata = ObjectMetadata {
            size: meta.len(),
            content_type: self.content_type_of(prefix, name).await,
            etag: None,
        };
        Ok((Box::pin(file), metadata))
    }

    async fn delete(&self, prefix: Prefix, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(prefix, name)?;
        remove_if_present(&path).await?;
        remove_if_present(&self.type_path(prefix, name)).await
    }

    async fn copy(
        &self,
        src_prefix: Prefix,
        src_name: &str,
        dst_prefix: Prefix,
        dst_name: &str,
    ) -> Result<(), StoreError> {
        let src = self.path_for(src_prefix, src_name)?;
        let dst = self.path_for(dst_prefix, dst_name)?;
        self.ensure_dir(dst_prefix).await?;

        let tmp = self.temp_path().await?;
        if let Err(e) = fs::copy(&src, &tmp).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(Self::map_missing(e, src_prefix, src_name));
        }
        if let Err(e) = fs::rename(&tmp, &dst).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }
        let content_type = self.content_type_of(src_prefix, src_name).await;
        self.write_content_type(dst_prefix, dst_name, &content_type).await
    }

    async fn list(&self, prefix: Prefix) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(prefix.dir_name());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    }
}
