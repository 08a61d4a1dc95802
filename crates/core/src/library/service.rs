//! File library operations over the object store and the record table.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use super::{FileRecord, FileStore, LibraryError, NewFile};
use crate::storage::{
    client_basename, split_extension, validate_name, ObjectStore, Prefix, DEFAULT_CONTENT_TYPE,
};

/// Uploaded files kept under `files/`, each with a library record.
pub struct FileLibrary {
    store: Arc<dyn FileStore>,
    objects: Arc<ObjectStore>,
}

impl FileLibrary {
    pub fn new(store: Arc<dyn FileStore>, objects: Arc<ObjectStore>) -> Self {
        Self { store, objects }
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Store an upload under a free name derived from the client filename.
    ///
    /// The object is removed again if the record cannot be written.
    pub async fn upload(
        &self,
        original_name: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<FileRecord, LibraryError> {
        let base = client_basename(original_name);
        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let size = data.len() as u64;

        let filename = self
            .objects
            .store_unique(Prefix::Files, base, data, content_type)
            .await?;

        let record = self.store.create(&NewFile {
            filename: filename.clone(),
            content_type: content_type.to_string(),
            size,
        });
        match record {
            Ok(record) => {
                info!(filename = %record.filename, size, "File added to library");
                Ok(record)
            }
            Err(e) => {
                if let Err(purge) = self.objects.purge(Prefix::Files, &filename).await {
                    warn!(filename = %filename, error = %purge, "Failed to remove orphaned upload");
                }
                Err(e)
            }
        }
    }

    /// Files sorted by name, optionally narrowed to names containing `query`.
    pub fn list(&self, query: Option<&str>) -> Result<Vec<FileRecord>, LibraryError> {
        self.store.list(query)
    }

    /// Rename a file, keeping its extension.
    ///
    /// `new_stem` is the new name without the extension; a trailing copy of
    /// the current extension is accepted and not doubled.
    pub async fn rename(&self, old_name: &str, new_stem: &str) -> Result<FileRecord, LibraryError> {
        let record = self
            .store
            .find(old_name)?
            .ok_or_else(|| LibraryError::NotFound(old_name.to_string()))?;

        let new_name = renamed(old_name, new_stem)?;
        if new_name == old_name {
            return Ok(record);
        }
        if self.store.find(&new_name)?.is_some()
            || self.objects.exists(Prefix::Files, &new_name).await?
        {
            return Err(LibraryError::AlreadyExists(new_name));
        }

        self.objects
            .rename(Prefix::Files, old_name, &new_name)
            .await?;

        if let Err(e) = self.store.rename(old_name, &new_name) {
            if let Err(undo) = self.objects.rename(Prefix::Files, &new_name, old_name).await {
                warn!(from = %new_name, to = %old_name, error = %undo, "Failed to restore renamed object");
            }
            return Err(e);
        }

        info!(from = %old_name, to = %new_name, "File renamed");
        Ok(FileRecord {
            filename: new_name,
            ..record
        })
    }

    /// Remove a file and its record.
    pub async fn delete(&self, filename: &str) -> Result<(), LibraryError> {
        if self.store.find(filename)?.is_none() {
            return Err(LibraryError::NotFound(filename.to_string()));
        }
        self.objects.purge(Prefix::Files, filename).await?;
        self.store.delete(filename)?;
        info!(filename, "File deleted from library");
        Ok(())
    }
}

fn renamed(old_name: &str, new_stem: &str) -> Result<String, LibraryError> {
    let (_, ext) = split_extension(old_name);
    let stem = new_stem.trim();
    let stem = if !ext.is_empty()
        && stem.len() > ext.len()
        && stem
            .get(stem.len() - ext.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(ext))
    {
        &stem[..stem.len() - ext.len()]
    } else {
        stem
    };
    if stem.is_empty() {
        return Err(LibraryError::InvalidName("new name is empty".to_string()));
    }

    let new_name = format!("{}{}", stem, ext);
    validate_name(&new_name).map_err(|e| LibraryError::InvalidName(e.to_string()))?;
    Ok(new_name)
}
