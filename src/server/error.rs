//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::GradeError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Errors raised while serving a prediction are all reported as 400.
    pub fn prediction(err: GradeError) -> Self {
        match err {
            GradeError::NotFound(_) | GradeError::Conflict(_) | GradeError::StoreUnavailable(_) => {
                ServerError::from(err)
            }
            other => ServerError::BadRequest(other.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GradeError> for ServerError {
    fn from(err: GradeError) -> Self {
        match err {
            e if e.is_client_error() => ServerError::BadRequest(e.to_string()),
            GradeError::NotFound(msg) => ServerError::NotFound(format!("Not found: {}", msg)),
            GradeError::Conflict(msg) => ServerError::Conflict(msg),
            GradeError::StoreUnavailable(msg) => {
                ServerError::Unavailable(format!("Document store unavailable: {}", msg))
            }
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
                "An internal error occurred".to_string()
            }
            ServerError::Unavailable(detail) => {
                tracing::warn!(detail = %detail, "Store unavailable");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
