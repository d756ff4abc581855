use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::browsers::QueryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: String,
    },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn endpoint_not_found(method: &str, path: &str) -> Self {
        Self::NotFound {
            message: format!("Endpoint not found: {method} {path}"),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shared by every HTTP front end. Internal messages never leave the process.
    pub fn error_body(&self) -> ErrorResponse {
        let error = match self {
            Self::BadRequest { message, .. } | Self::NotFound { message } => message.clone(),
            Self::Internal { code, message } => {
                tracing::error!(
                    code = %code,
                    error = %message,
                    "request failed with internal error"
                );
                "Internal server error".to_string()
            }
        };

        ErrorResponse { error }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidInput(message) => Self::bad_request("invalid_input", message),
            QueryError::Syntax(message) => Self::bad_request("query_syntax_error", message),
            QueryError::Coverage(message) => Self::bad_request("coverage_error", message),
            QueryError::Engine(message) => Self::internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.error_body())).into_response()
    }
}
