//! Local generator script run as a child process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::staging::staged_artifact;
use super::{BackendError, GeneratedArtifacts, GenerationBackend, GenerationRequest};
use crate::storage::Prefix;

/// Runs `<interpreter> <script> <request.json>` and reads the produced file
/// names from stdout.
///
/// The child is killed when the attempt is dropped, so an outer timeout
/// never leaves it running.
pub struct SubprocessBackend {
    interpreters: Vec<String>,
    script: PathBuf,
    staging_dir: PathBuf,
}

impl SubprocessBackend {
    pub fn new(
        interpreters: Vec<String>,
        script: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreters,
            script: script.into(),
            staging_dir: staging_dir.into(),
        }
    }

    async fn run(&self, request_path: &Path) -> Result<String, BackendError> {
        let mut last_error = None;

        for interpreter in &self.interpreters {
            let output = Command::new(interpreter)
                .arg(&self.script)
                .arg(request_path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await;

            match output {
                Ok(output) if output.status.success() => {
                    return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(BackendError::Rejected(format!(
                        "{} exited with code {:?}: {}",
                        interpreter,
                        output.status.code(),
                        stderr.trim()
                    )));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(interpreter = %interpreter, "Interpreter not found, trying next");
                    last_error = Some(BackendError::Io(e));
                }
                Err(e) => return Err(BackendError::Io(e)),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::Rejected("no interpreter configured".to_string())
        }))
    }
}

/// Extract artifact names from generator stdout.
///
/// Lines are stripped of BOM and CR; progress lines (containing `%`) are
/// skipped. The last `.pdf` line is the primary, the last `.png` the preview.
pub fn parse_generator_output(
    stdout: &str,
    staging_dir: &Path,
) -> Result<GeneratedArtifacts, BackendError> {
    let mut primary = None;
    let mut preview = None;

    for raw in stdout.lines() {
        let line = raw
            .trim_start_matches('\u{feff}')
            .trim_end_matches('\r')
            .trim();
        if line.is_empty() || line.contains('%') {
            continue;
        }

        let name = Path::new(line)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(line);
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            primary = Some(name.to_string());
        } else if lower.ends_with(".png") {
            preview = Some(name.to_string());
        }
    }

    let primary = primary.ok_or_else(|| {
        BackendError::InvalidOutput("generator printed no .pdf file name".to_string())
    })?;

    Ok(GeneratedArtifacts {
        primary: staged_artifact(staging_dir, Prefix::Reports, &primary)?,
        preview: preview
            .map(|name| staged_artifact(staging_dir, Prefix::Previews, &name))
            .transpose()?,
    })
}

#[async_trait]
impl GenerationBackend for SubprocessBackend {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifacts, BackendError> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;

        let request_path = self.staging_dir.join(format!(
            "report_data_{}.json",
            uuid::Uuid::new_v4().simple()
        ));
        let payload =
            serde_json::to_vec(request).map_err(|e| BackendError::Request(e.to_string()))?;
        tokio::fs::write(&request_path, payload).await?;

        let result = self.run(&request_path).await;

        if let Err(e) = tokio::fs::remove_file(&request_path).await {
            warn!(path = %request_path.display(), error = %e, "Failed to remove request file");
        }

        parse_generator_output(&result?, &self.staging_dir)
    }
}
