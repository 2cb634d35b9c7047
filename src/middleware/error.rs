//! Standardized JSON error responses.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

/// Error envelope returned to clients for every failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    fn envelope(error: ErrorCode, message: String, request_id: Option<String>, retryable: bool) -> Self {
        Self {
            error,
            message,
            request_id,
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(retryable),
        }
    }

    pub fn from_app_error(error: &AppError) -> Self {
        Self::envelope(
            error.error_code(),
            error.user_message(),
            error.request_id.clone(),
            error.is_retryable(),
        )
    }

    pub fn internal_error(request_id: Option<String>) -> Self {
        Self::envelope(
            ErrorCode::InternalError,
            "An internal server error occurred. Please try again later.".to_string(),
            request_id,
            false,
        )
    }

    pub fn bad_request(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self::envelope(ErrorCode::ValidationError, message.into(), request_id, false)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = ?self, request_id = ?self.request_id, status = %status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = ?self, request_id = ?self.request_id, status = %status.as_u16(), "request rejected");
        }

        (status, Json(ErrorResponse::from_app_error(&self))).into_response()
    }
}

/// Request id as propagated by the request-id layer.
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Error tuple for handlers that report a bare status + message. Client
/// errors echo the message; server errors get the generic envelope so
/// internals stay private.
pub fn json_error_response(
    status: StatusCode,
    message: impl Into<String>,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    let body = if status.is_client_error() {
        ErrorResponse::bad_request(request_id, message)
    } else {
        ErrorResponse::internal_error(request_id)
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, DomainError, ValidationError};

    #[test]
    fn envelope_carries_code_and_request_id() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
            payment_id: "p_123".to_string(),
        }))
        .with_request_id("req_123");

        let body = ErrorResponse::from_app_error(&app_error);
        assert_eq!(body.error, ErrorCode::PaymentNotFound);
        assert_eq!(body.request_id.as_deref(), Some("req_123"));
    }

    #[test]
    fn validation_errors_become_400_responses() {
        let app_error = AppError::new(AppErrorKind::Validation(ValidationError::InvalidAmount {
            amount: "-100".to_string(),
            reason: "Amount cannot be negative".to_string(),
        }));
        assert_eq!(app_error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn client_errors_echo_the_message() {
        let (status, Json(body)) = json_error_response(
            StatusCode::BAD_REQUEST,
            "email is required",
            Some("req_789".to_string()),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "email is required");
    }

    #[test]
    fn server_errors_hide_the_message() {
        let (_, Json(body)) =
            json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "pool exhausted", None);
        assert!(!body.message.contains("pool"));
    }
}
