//! Error types for upload, extraction and compilation

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who caused a failure
///
/// Client-caused failures surface as bad requests, everything else as
/// internal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    ServerError,
}

/// Engine errors
///
/// The `Display` text of each variant is the message shown to the caller.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Token or action failed validation. The text never names the failed check.
    #[error("Invalid parameters")]
    InvalidParameters,

    #[error("Missing data on upload")]
    MissingUploadData,

    #[error("Server error while writing file chunk: {0}")]
    ChunkWrite(#[source] std::io::Error),

    #[error("Chunks must be uploaded before compiling")]
    MissingUpload,

    #[error("{0} was not uploaded")]
    MissingEntryFile(String),

    #[error("PDF compilation failed. Log: \n{log}")]
    CompileFailed { log: String },

    #[error("PDF compilation failed and no log file was generated.")]
    NoLog,

    #[error("Compilation timed out. Your LaTeX job took too long to run.")]
    Timeout { step: String, limit: Duration },

    #[error("An unexpected error occurred: failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("An unexpected error occurred: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Archive entry that is a link or would land outside the working directory
    #[error("An unexpected error occurred: unsupported archive entry '{0}'")]
    UnsafeEntry(String),

    #[error("An unexpected error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("An unexpected error occurred: {0}")]
    Task(String),
}

impl EngineError {
    /// Classify the error as client- or server-caused
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidParameters
            | EngineError::MissingUploadData
            | EngineError::MissingUpload
            | EngineError::MissingEntryFile(_)
            | EngineError::CompileFailed { .. }
            | EngineError::Timeout { .. } => ErrorKind::InvalidRequest,
            EngineError::ChunkWrite(_)
            | EngineError::NoLog
            | EngineError::Spawn { .. }
            | EngineError::Archive(_)
            | EngineError::UnsafeEntry(_)
            | EngineError::Io(_)
            | EngineError::Task(_) => ErrorKind::ServerError,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidRequest
    }
}
