//! On-disk upload storage
//!
//! One archive file per session, named after the token, under an injected
//! storage root. Chunks are only ever appended.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::token::SessionToken;
use crate::compiler::errors::EngineError;
use crate::config::ARCHIVE_EXTENSION;

/// Archive storage rooted at a single directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage root if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Path of the archive owned by `token`
    pub fn archive_path(&self, token: &SessionToken) -> PathBuf {
        self.root
            .join(format!("{}.{}", token.as_str(), ARCHIVE_EXTENSION))
    }

    /// Append one chunk to the session's archive, creating it on first use
    pub async fn append(&self, token: &SessionToken, chunk: &[u8]) -> Result<(), EngineError> {
        if chunk.is_empty() {
            return Err(EngineError::MissingUploadData);
        }

        let path = self.archive_path(token);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(EngineError::ChunkWrite)?;
        file.write_all(chunk).await.map_err(EngineError::ChunkWrite)?;
        file.flush().await.map_err(EngineError::ChunkWrite)?;

        debug!(session = %token, bytes = chunk.len(), "Chunk appended");
        Ok(())
    }

    pub async fn exists(&self, token: &SessionToken) -> Result<bool, EngineError> {
        Ok(tokio::fs::try_exists(self.archive_path(token)).await?)
    }

    /// Delete the session's archive. A missing archive is not an error.
    pub async fn remove(&self, token: &SessionToken) -> Result<(), EngineError> {
        match tokio::fs::remove_file(self.archive_path(token)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Arm a guard that deletes the session's archive when dropped
    pub fn cleanup_guard(&self, token: &SessionToken) -> ArchiveCleanup {
        ArchiveCleanup {
            path: Some(self.archive_path(token)),
        }
    }

    /// Delete archives whose last write is older than `max_age`
    ///
    /// Returns the number of archives removed.
    pub async fn sweep_orphans(&self, max_age: Duration) -> Result<usize, EngineError> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARCHIVE_EXTENSION) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove orphaned archive: {}", e),
            }
        }

        if removed > 0 {
            info!(removed, "Swept orphaned upload archives");
        }
        Ok(removed)
    }
}

/// Removes a session archive when dropped, whatever the outcome of the
/// surrounding call
///
/// Callers remove the archive with [`UploadStore::remove`] on the normal path
/// and then [`disarm`](Self::disarm) the guard. The guard only fires when the
/// call is cancelled or unwinds before that.
#[derive(Debug)]
pub struct ArchiveCleanup {
    path: Option<PathBuf>,
}

impl ArchiveCleanup {
    /// The archive was already removed; do nothing on drop
    pub fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for ArchiveCleanup {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        // Drop cannot await; a single unlink on the worker thread is acceptable.
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed session archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove session archive: {}", e),
        }
    }
}
