//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shelf_engine::{ErrorKind, StoreError};

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Engine(#[from] shelf_engine::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[source] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(e) => match (e.kind(), e.store_error()) {
                (ErrorKind::NotInitialized | ErrorKind::VersionConflict, _) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                (ErrorKind::OperationFailed, Some(StoreError::Constraint { .. })) => {
                    StatusCode::CONFLICT
                }
                (ErrorKind::OperationFailed, Some(StoreError::Data(_))) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Snapshot(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Engine(e) => {
                if status.is_server_error() {
                    tracing::warn!("Engine error: {}", e);
                }
                ErrorResponse {
                    error: e.to_string(),
                    kind: Some(e.kind()),
                    details: e.store_error().map(|source| source.to_string()),
                }
            }
            AppError::Snapshot(_) | AppError::Io(_) => {
                tracing::error!("Internal error: {}", self);
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    kind: None,
                    details: Some(self.to_string()),
                }
            }
            AppError::BadRequest(msg) | AppError::NotFound(msg) => ErrorResponse {
                error: msg.clone(),
                kind: None,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
