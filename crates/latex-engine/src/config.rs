//! Engine configuration
//!
//! Everything the engine touches on disk or runs as a subprocess is decided
//! here and handed to [`Compiler::new`](crate::Compiler::new). Nothing is
//! read from process-wide state.

use std::path::PathBuf;
use std::time::Duration;

use crate::compiler::pipeline::Pipeline;

/// Default wall-clock limit for a single toolchain step
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix every session token must start with
pub const DEFAULT_TOKEN_PREFIX: &str = "plaintext";

/// Extension of the per-session archive file
pub const ARCHIVE_EXTENSION: &str = "zip";

/// File names the pipeline reads and writes inside the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Root source file the toolchain is pointed at
    pub entry_file: String,
    /// Output the toolchain produces on success
    pub artifact_file: String,
    /// Diagnostic log the toolchain leaves behind
    pub log_file: String,
    /// Name the artifact is offered for download as
    pub download_name: String,
}

impl ProjectLayout {
    /// Entry file name without its extension (`main` for `main.tex`)
    pub fn entry_stem(&self) -> &str {
        self.entry_file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.entry_file)
    }
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self {
            entry_file: "main.tex".to_string(),
            artifact_file: "main.pdf".to_string(),
            log_file: "main.log".to_string(),
            download_name: "output.pdf".to_string(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one archive per active session
    pub storage_root: PathBuf,
    /// Parent for per-compile working directories (system temp dir if unset)
    pub work_root: Option<PathBuf>,
    /// Required token prefix
    pub token_prefix: String,
    /// Entry, artifact and log file names
    pub layout: ProjectLayout,
    /// Ordered toolchain steps
    pub pipeline: Pipeline,
}

impl EngineConfig {
    /// Standard LaTeX configuration storing uploads under `storage_root`
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        let layout = ProjectLayout::default();
        let pipeline = Pipeline::latex(&layout, DEFAULT_STEP_TIMEOUT);
        Self {
            storage_root: storage_root.into(),
            work_root: None,
            token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            layout,
            pipeline,
        }
    }

    /// Create working directories under `path` instead of the system temp dir
    pub fn with_work_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_root = Some(path.into());
        self
    }

    pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.token_prefix = prefix.into();
        self
    }

    /// Rebuild the default LaTeX pipeline with a different per-step timeout
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline = Pipeline::latex(&self.layout, timeout);
        self
    }

    /// Replace the toolchain steps entirely
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Use different file names, rebuilding the LaTeX pipeline around the new
    /// entry file. Apply before [`with_pipeline`](Self::with_pipeline).
    pub fn with_layout(mut self, layout: ProjectLayout) -> Self {
        let timeout = self
            .pipeline
            .steps()
            .first()
            .map(|step| step.timeout)
            .unwrap_or(DEFAULT_STEP_TIMEOUT);
        self.pipeline = Pipeline::latex(&layout, timeout);
        self.layout = layout;
        self
    }
}
