//! API handlers for the plainTeXt server
//!
//! Provides:
//! - `POST /compile?action=upload&upload_id=…` (raw chunk body)
//! - `POST /compile?action=compile&upload_id=…` (returns the PDF)
//! - `GET /health`

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use latex_engine::{Artifact, EngineError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "plaintext-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Query parameters of `/compile`
#[derive(Debug, Deserialize)]
pub struct CompileParams {
    pub action: Option<String>,
    pub upload_id: Option<String>,
}

/// Acknowledgement for an accepted chunk
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
}

/// Handler: POST /compile
pub async fn handle_compile(
    State(state): State<AppState>,
    params: Result<Query<CompileParams>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ServerError> {
    let Ok(Query(params)) = params else {
        return Err(EngineError::InvalidParameters.into());
    };
    let (Some(action), Some(upload_id)) = (params.action, params.upload_id) else {
        return Err(EngineError::InvalidParameters.into());
    };
    if action.is_empty() {
        return Err(EngineError::InvalidParameters.into());
    }
    let token = state.compiler.validate_token(&upload_id)?;

    match action.as_str() {
        "upload" => {
            debug!(session = %token, bytes = body.len(), "Upload request");
            state.compiler.append(&token, &body).await?;
            Ok((
                StatusCode::OK,
                Json(UploadResponse {
                    status: "chunk received",
                }),
            )
                .into_response())
        }
        "compile" => {
            info!(session = %token, "Compile request");
            let artifact = state.compiler.compile(&token).await?;
            Ok(pdf_response(artifact))
        }
        other => {
            debug!(action = other, "Unknown action");
            Err(ServerError::InvalidRequest(
                "An unknown error occurred.".to_string(),
            ))
        }
    }
}

/// Attachment response carrying the produced document
fn pdf_response(artifact: Artifact) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}
