//! Upload-to-PDF orchestration
//!
//! [`Compiler`] ties the pieces together for the two client operations:
//!
//! - `append`: token lock, then chunk append
//! - `compile`: token lock, extraction into a fresh working directory, entry
//!   file check, pipeline, result resolution, archive removal
//!
//! The working directory and the session archive are both released when
//! `compile` returns, whatever the outcome. The working directory goes first,
//! the archive last.

pub mod errors;
pub mod pipeline;
pub mod resolve;

pub use errors::{EngineError, ErrorKind};
pub use pipeline::{CommandSpec, Pipeline, StepReport};

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::archive;
use crate::config::{EngineConfig, ProjectLayout};
use crate::session::{PrefixPolicy, SessionLocks, SessionToken, TokenPolicy, UploadStore};

/// A successfully produced document
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// Name the file is offered for download as
    pub file_name: String,
    pub mime_type: String,
}

/// Session-aware compile service
pub struct Compiler {
    policy: Arc<dyn TokenPolicy>,
    store: UploadStore,
    locks: SessionLocks,
    layout: ProjectLayout,
    pipeline: Pipeline,
    work_root: Option<PathBuf>,
}

impl Compiler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            policy: Arc::new(PrefixPolicy::new(config.token_prefix)),
            store: UploadStore::new(config.storage_root),
            locks: SessionLocks::new(),
            layout: config.layout,
            pipeline: config.pipeline,
            work_root: config.work_root,
        }
    }

    /// Swap the token policy, e.g. for one backed by real authentication
    pub fn with_policy(mut self, policy: Arc<dyn TokenPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// Validate a raw client token
    pub fn validate_token(&self, raw: &str) -> Result<SessionToken, EngineError> {
        self.policy.validate(raw)
    }

    /// Append one uploaded chunk to the session's archive
    #[instrument(skip(self, token, chunk), fields(session = %token, bytes = chunk.len()))]
    pub async fn append(&self, token: &SessionToken, chunk: &[u8]) -> Result<(), EngineError> {
        let _session = self.locks.acquire(token).await;
        self.store.append(token, chunk).await
    }

    /// Build the session's uploaded project into a PDF
    ///
    /// The session archive is deleted before this returns, so a second call
    /// without new uploads fails with [`EngineError::MissingUpload`].
    #[instrument(skip(self, token), fields(session = %token))]
    pub async fn compile(&self, token: &SessionToken) -> Result<Artifact, EngineError> {
        let _session = self.locks.acquire(token).await;
        // Fallback for cancellation and unwinding; disarmed once removed below.
        let cleanup = self.store.cleanup_guard(token);

        // The working directory is gone by the time `build` returns.
        let result = self.build(token).await;

        match self.store.remove(token).await {
            Ok(()) => cleanup.disarm(),
            Err(e) => warn!("Failed to remove session archive, retrying on drop: {}", e),
        }

        if let Ok(artifact) = &result {
            info!(size = artifact.bytes.len(), "Compile succeeded");
        }
        result
    }

    async fn build(&self, token: &SessionToken) -> Result<Artifact, EngineError> {
        if !self.store.exists(token).await? {
            return Err(EngineError::MissingUpload);
        }

        let work_dir = self.create_work_dir()?;
        debug!(work_dir = %work_dir.path().display(), "Created working directory");

        archive::extract(&self.store.archive_path(token), work_dir.path()).await?;

        let entry = work_dir.path().join(&self.layout.entry_file);
        if !tokio::fs::try_exists(&entry).await? {
            return Err(EngineError::MissingEntryFile(self.layout.entry_file.clone()));
        }

        self.pipeline.run(work_dir.path()).await?;
        resolve::resolve(work_dir.path(), &self.layout).await
    }

    fn create_work_dir(&self) -> Result<TempDir, EngineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("plaintext-build-");
        let dir = match &self.work_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}
