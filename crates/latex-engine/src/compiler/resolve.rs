//! Turn the pipeline's side effects into a result
//!
//! Success is decided purely by whether the artifact file exists. Only
//! regular files count; a link in its place is treated as absent.

use std::path::Path;

use tracing::{debug, info};

use super::errors::EngineError;
use super::Artifact;
use crate::config::ProjectLayout;

/// MIME type of the produced artifact
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Inspect `work_dir` after the pipeline ran
///
/// - artifact present: return its bytes
/// - artifact missing, log present: [`EngineError::CompileFailed`] with the log text
/// - neither: [`EngineError::NoLog`]
pub async fn resolve(work_dir: &Path, layout: &ProjectLayout) -> Result<Artifact, EngineError> {
    let artifact_path = work_dir.join(&layout.artifact_file);
    if is_regular_file(&artifact_path).await? {
        let bytes = tokio::fs::read(&artifact_path).await?;
        info!(size = bytes.len(), "Compilation produced {}", layout.artifact_file);
        return Ok(Artifact {
            bytes,
            file_name: layout.download_name.clone(),
            mime_type: PDF_MIME_TYPE.to_string(),
        });
    }

    let log_path = work_dir.join(&layout.log_file);
    if is_regular_file(&log_path).await? {
        let raw = tokio::fs::read(&log_path).await?;
        let log = String::from_utf8_lossy(&raw).into_owned();
        debug!(log_bytes = raw.len(), "No artifact, returning log");
        return Err(EngineError::CompileFailed { log });
    }

    Err(EngineError::NoLog)
}

async fn is_regular_file(path: &Path) -> Result<bool, EngineError> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => Ok(metadata.file_type().is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
