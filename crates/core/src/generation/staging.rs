//! Shared staging directory where generators drop their output files.
//!
//! Layout: `<staging>/reports/<primary>` and `<staging>/previews/<preview>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::warn;

use super::{Artifact, ArtifactSource, BackendError, GeneratedArtifacts};
use crate::storage::{validate_name, Prefix};

/// Path of a staged file, rejecting names that would escape the staging directory.
pub fn staged_path(staging_dir: &Path, prefix: Prefix, name: &str) -> Result<PathBuf, BackendError> {
    validate_name(name).map_err(|e| BackendError::InvalidOutput(e.to_string()))?;
    Ok(staging_dir.join(prefix.dir_name()).join(name))
}

pub fn staged_artifact(staging_dir: &Path, prefix: Prefix, name: &str) -> Result<Artifact, BackendError> {
    let path = staged_path(staging_dir, prefix, name)?;
    Ok(Artifact::staged(name, path))
}

/// Load the bytes of an artifact, wherever they are.
pub async fn read_artifact(artifact: &Artifact) -> std::io::Result<Bytes> {
    match &artifact.source {
        ArtifactSource::Bytes(data) => Ok(data.clone()),
        ArtifactSource::Staged(path) => tokio::fs::read(path).await.map(Bytes::from),
    }
}

/// Read every staged artifact into memory and remove the staged files.
///
/// A staged file that cannot be read makes the whole output unusable; the
/// staged files are removed either way.
pub async fn load_artifacts(artifacts: GeneratedArtifacts) -> Result<GeneratedArtifacts, BackendError> {
    let loaded = load_all(&artifacts).await;
    remove_staged(&artifacts).await;
    loaded
}

async fn load_all(artifacts: &GeneratedArtifacts) -> Result<GeneratedArtifacts, BackendError> {
    let primary = load_one(&artifacts.primary).await?;
    let preview = match &artifacts.preview {
        Some(preview) => Some(load_one(preview).await?),
        None => None,
    };
    Ok(GeneratedArtifacts { primary, preview })
}

async fn load_one(artifact: &Artifact) -> Result<Artifact, BackendError> {
    let data = read_artifact(artifact).await.map_err(|e| {
        BackendError::InvalidOutput(format!("cannot read {}: {}", artifact.name, e))
    })?;
    Ok(Artifact::inline(artifact.name.clone(), data))
}

/// Remove staged files belonging to `artifacts`. Missing files are ignored.
pub async fn remove_staged(artifacts: &GeneratedArtifacts) {
    let staged = std::iter::once(&artifacts.primary).chain(artifacts.preview.iter());
    for artifact in staged {
        if let ArtifactSource::Staged(path) = &artifact.source {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged file"),
            }
        }
    }
}
