//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same `{ error, message }` body and maps
//! inventory and chat failures to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use labkeeper_chat::{ChatError, ValidationError};
use labkeeper_core::error::LabError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - not enough stock, or the item is already booked.
    Conflict(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - the database could not be reached.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Something went wrong while handling the request".to_string(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!(error = %msg, "Database unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "The lab database is unavailable, please try again shortly".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LabError> for ApiError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            LabError::InsufficientQuantity { .. } | LabError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            LabError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            LabError::Storage(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(format!("Invalid {}: {}", err.field, err.message))
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(v) => v.into(),
            ChatError::Database(msg) => ApiError::ServiceUnavailable(msg),
            ChatError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_error_status_mapping() {
        let cases = [
            (
                LabError::NotFound { entity: "chemical", id: 7 },
                StatusCode::NOT_FOUND,
            ),
            (
                LabError::InsufficientQuantity { requested: 5.0, available: 1.0 },
                StatusCode::CONFLICT,
            ),
            (LabError::Conflict("booked".to_string()), StatusCode::CONFLICT),
            (LabError::validation("quantity_used", "must be greater than zero"), StatusCode::BAD_REQUEST),
            (LabError::Storage("locked".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (LabError::Config("bad".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_chat_validation_is_bad_request() {
        let err: ApiError = ChatError::from(ValidationError::new("user_id", "is required")).into();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid user_id: is required"));
    }
}
