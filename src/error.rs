use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

// Postgres SQLSTATE codes surfaced to clients as 409.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// AppError
///
/// The single error type returned by repositories and handlers. Each variant maps to
/// exactly one HTTP status in `into_response`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("You do not have permission to perform this action")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// status_and_message
    ///
    /// Resolves the HTTP status and the client-facing message. Database and internal
    /// failures never leak their details to the client.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "Record not found".to_string())
            }
            AppError::Database(e) => {
                let code = e.as_database_error().and_then(|db| db.code());
                match code.as_deref() {
                    Some(UNIQUE_VIOLATION) => {
                        (StatusCode::CONFLICT, "A record with the same unique value already exists".to_string())
                    }
                    Some(FOREIGN_KEY_VIOLATION) => {
                        (StatusCode::CONFLICT, "The record is referenced by other data".to_string())
                    }
                    _ => {
                        tracing::error!(error = ?e, "database error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "An error occurred".to_string())
                    }
                }
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An error occurred".to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// ErrorBody
///
/// JSON body of every error response: `{ "message": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorBody { message })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
