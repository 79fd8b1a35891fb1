// Application error type and its JSON response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The identity assertion failed signature verification.
    #[error("Invalid authentication")]
    Authentication,

    /// The request body is not JSON.
    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The persistent store failed or rejected the write.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidBody => StatusCode::BAD_REQUEST,
            AppError::Authentication => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            AppError::Storage(e) => {
                tracing::error!("Database error: {e}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

/// Result type alias for handlers and services.
pub type Result<T> = std::result::Result<T, AppError>;
