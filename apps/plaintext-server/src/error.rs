//! Error types for the plainTeXt server

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use latex_engine::{EngineError, ErrorKind};
use thiserror::Error;
use tracing::error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Client-caused failure (400)
    #[error("{0}")]
    InvalidRequest(String),

    /// System-caused failure (500)
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ServerError::InvalidRequest(msg) => msg,
            ServerError::Internal(msg) => {
                error!("Internal error: {}", msg);
                msg
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        match err.kind() {
            ErrorKind::InvalidRequest => ServerError::InvalidRequest(err.to_string()),
            ErrorKind::ServerError => ServerError::Internal(err.to_string()),
        }
    }
}
