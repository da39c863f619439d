
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::shared::types::ApiResponse;

const TRY_AGAIN_MESSAGE: &str = "Service temporarily unavailable, please try again.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The same user reported the same issue twice
    #[error("Duplicate report for issue {0}")]
    DuplicateReport(uuid::Uuid),

    /// Severity model or vectorizer could not be loaded
    #[error("Model artifact error: {0}")]
    ArtifactLoad(String),

    /// Concurrent update conflict that survived the retry budget
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl AppError {
    /// Whether the failed unit of work may be retried as a whole
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageConflict(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(ref msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                Some(vec![msg.clone()]),
            ),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Auth(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Unauthorized(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::DuplicateReport(_) => (
                StatusCode::CONFLICT,
                "You have already reported this issue.".to_string(),
                None,
            ),
            AppError::ArtifactLoad(ref msg) => {
                tracing::error!("Model artifact error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    TRY_AGAIN_MESSAGE.to_string(),
                    None,
                )
            }
            AppError::StorageConflict(ref msg) => {
                tracing::error!("Storage conflict: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    TRY_AGAIN_MESSAGE.to_string(),
                    None,
                )
            }
            AppError::ExternalServiceError(ref msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, TRY_AGAIN_MESSAGE.to_string(), None)
            }
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

/// Convert a database error, classifying concurrency failures as retryable
pub fn handle_db_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.code().as_deref() {
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01") => {
                return AppError::StorageConflict(db_err.message().to_string());
            }
            // unique_violation: a concurrent writer created the same row first
            Some("23505") => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return AppError::StorageConflict(format!(
                    "unique constraint {} violated",
                    constraint
                ));
            }
            // foreign_key_violation
            Some("23503") => {
                return AppError::BadRequest("Referenced record does not exist.".to_string());
            }
            _ => {}
        }
    }

    AppError::Database(e)
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_conflicts_are_retryable() {
        assert!(AppError::StorageConflict("deadlock".into()).is_retryable());
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::ArtifactLoad("missing".into()).is_retryable());
    }

    #[test]
    fn test_failures_hide_internals() {
        let response = AppError::ArtifactLoad("/srv/model.json: no such file".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::StorageConflict("deadlock".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::DuplicateReport(uuid::Uuid::nil()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_upstream_failure_body_is_generic() {
        let response = AppError::ExternalServiceError(
            "POST http://ollama.internal:11434/api/embeddings: connection refused".into(),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], TRY_AGAIN_MESSAGE);
        assert!(!String::from_utf8_lossy(&bytes).contains("ollama.internal"));
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = handle_db_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
