use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use agora_db::DbError;

/// API-level error taxonomy. The single IntoResponse impl below is the
/// only place status codes are assigned, so a handler can never disagree
/// with another about what a Conflict means.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid or missing credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Validation(msg) => ApiError::Validation(msg),
            DbError::Forbidden(msg) => ApiError::Forbidden(msg),
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            // Unexpected failures: log the cause, hand the client a
            // generic body.
            DbError::Sqlite(e) => {
                error!("database error: {}", e);
                ApiError::Internal
            }
            DbError::Internal(msg) => {
                error!("internal error: {}", msg);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_expected_statuses() {
        let cases = [
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn db_errors_carry_their_kind_across_the_boundary() {
        let err: ApiError = DbError::conflict("Thread is locked").into();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Thread is locked");

        let err: ApiError = DbError::internal("details stay server-side").into();
        assert_eq!(err.to_string(), "Internal server error");
    }
}
