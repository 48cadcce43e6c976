use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable error body returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Forbidden", "Conflict")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Error taxonomy for the access-control / order-lifecycle core.
///
/// Scope Resolver and Permission Matrix failures surface as `Forbidden`
/// or `NotFound` before any data query runs; state machine failures keep
/// their specific kind and leave the order untouched. None of these are
/// transient faults, so nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("A rejection reason is required when rejecting an order")]
    MissingReason,

    #[error("Illegal deletion: {0}")]
    IllegalDeletion(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ValidationError(_) | ServiceError::MissingReason => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::InvalidTransition(_) | ServiceError::IllegalDeletion(_) => {
                StatusCode::CONFLICT
            }
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message exposed to the caller. Storage-level details stay in the
    /// logs; everything else is safe to return verbatim.
    pub fn response_message(&self) -> String {
        match self {
            ServiceError::DatabaseError(err) => {
                tracing::error!(error = %err, "database error");
                "Internal server error".to_string()
            }
            ServiceError::InternalError(msg) => {
                tracing::error!(error = %msg, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(
            ServiceError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidTransition("pending -> completed".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::MissingReason.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::IllegalDeletion("in_production".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn database_details_are_not_leaked() {
        let err = ServiceError::DatabaseError(sea_orm::DbErr::Custom(
            "connection string with password".into(),
        ));
        assert_eq!(err.response_message(), "Internal server error");
    }
}
