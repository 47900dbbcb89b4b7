//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, ...).
    ///
    /// Returns HTTP 500 and hides the details from the client.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    Unauthorized,

    /// Authenticated, but not allowed to act on this resource.
    #[error("Forbidden")]
    Forbidden,

    /// Requested resource does not exist or is not visible to the caller.
    ///
    /// The payload names the resource and becomes the `<resource>_not_found`
    /// error code.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness or state conflict (duplicate email, trial already used, ...).
    #[error("{0}")]
    Conflict(String),

    /// The business plan does not allow one more product or image.
    #[error("{0}")]
    QuotaExceeded(String),

    /// A payment status change that the lifecycle does not allow.
    #[error("Cannot move payment from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Request body or parameters are invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Inbound payment notification failed signature verification.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The hosted checkout provider failed or returned garbage.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Object storage configuration, signing or lookup failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, String) {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key".to_string(),
                self.to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden".to_string(),
                self.to_string(),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{}_not_found", resource.replace(' ', "_")),
                self.to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict".to_string(), msg.clone()),
            AppError::QuotaExceeded(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "quota_exceeded".to_string(),
                msg.clone(),
            ),
            AppError::InvalidTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_transition".to_string(),
                self.to_string(),
            ),
            AppError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request".to_string(),
                msg.clone(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature".to_string(),
                self.to_string(),
            ),
            AppError::Gateway(_) => (
                StatusCode::BAD_GATEWAY,
                "gateway_error".to_string(),
                "The payment provider could not process the request".to_string(),
            ),
            AppError::Database(_) | AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                "An internal error occurred".to_string(),
            ),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_code_names_the_resource() {
        let (status, code, message) = AppError::NotFound("business").parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "business_not_found");
        assert_eq!(message, "business not found");

        let (_, code, _) = AppError::NotFound("webhook event").parts();
        assert_eq!(code, "webhook_event_not_found");
    }

    #[test]
    fn internal_errors_hide_details() {
        let (status, code, message) = AppError::Storage("missing secret key".into()).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "internal_error");
        assert!(!message.contains("secret"));

        let (status, _, message) = AppError::Gateway("token=abc".into()).parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!message.contains("abc"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::Unauthorized.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidSignature.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.parts().0, StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::QuotaExceeded("full".into()).parts().0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::InvalidTransition {
                from: "approved".into(),
                to: "rejected".into()
            }
            .parts()
            .0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidRequest("bad".into()).parts().0,
            StatusCode::BAD_REQUEST
        );
    }
}
