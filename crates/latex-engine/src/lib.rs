//! LaTeX project compilation engine
//!
//! This crate turns a chunked upload of a zipped LaTeX project into a PDF:
//! - Session token validation behind a swappable policy
//! - Append-only chunk storage, one archive per session
//! - Archive extraction into an isolated working directory
//! - A fixed pdflatex/bibtex/pdflatex/pdflatex pipeline with per-step timeouts
//! - Artifact or diagnostic log resolution, with unconditional cleanup

pub mod archive;
pub mod compiler;
pub mod config;
pub mod session;

pub use compiler::{Artifact, CommandSpec, Compiler, EngineError, ErrorKind, Pipeline};
pub use config::{EngineConfig, ProjectLayout, DEFAULT_STEP_TIMEOUT, DEFAULT_TOKEN_PREFIX};
pub use session::{PrefixPolicy, SessionToken, TokenPolicy, UploadStore};
