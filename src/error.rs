//! Unified error handling for the paylink backend.
//!
//! Errors are grouped by origin (domain, infrastructure, external service,
//! validation) and carry an HTTP status mapping plus a user-facing message so
//! handlers never leak internal detail to clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes for programmatic client handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,
    #[serde(rename = "TOKEN_INVALID")]
    TokenInvalid,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Order with the given number or token doesn't exist
    OrderNotFound { reference: String },
    /// Payment attempt with the given id doesn't exist
    PaymentNotFound { payment_id: String },
    /// Customer status token is past its validity window
    TokenExpired { order_number: String },
    /// Customer status token failed signature or shape checks
    TokenInvalid { reason: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// External service errors (payment gateways)
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    Timeout {
        service: String,
        timeout_secs: u64,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField { field: String },
    InvalidEmail { email: String },
    InvalidAmount { amount: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => 404,
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::TokenExpired { .. } => 410,
                DomainError::TokenInvalid { .. } => 401,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 502,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::TokenExpired { .. } => ErrorCode::TokenExpired,
                DomainError::TokenInvalid { .. } => ErrorCode::TokenInvalid,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }

    /// Message safe to return to API clients
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { reference } => {
                    format!("Order not found: {}", reference)
                }
                DomainError::PaymentNotFound { payment_id } => {
                    format!("Payment not found: {}", payment_id)
                }
                DomainError::TokenExpired { .. } => "This status link has expired".to_string(),
                DomainError::TokenInvalid { .. } => "Invalid status token".to_string(),
            },
            AppErrorKind::Infrastructure(_) => {
                "A temporary internal error occurred. Please try again later.".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { provider, .. } => {
                    format!("Payment provider {} is currently unavailable", provider)
                }
                ExternalError::Timeout { service, .. } => {
                    format!("Timed out waiting for {}", service)
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field is missing: {}", field)
                }
                ValidationError::InvalidEmail { email } => {
                    format!("Invalid email address: {}", email)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount {}: {}", amount, reason)
                }
            },
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AppErrorKind::Domain(err) => write!(f, "domain error: {:?}", err),
            AppErrorKind::Infrastructure(err) => write!(f, "infrastructure error: {:?}", err),
            AppErrorKind::External(err) => write!(f, "external error: {:?}", err),
            AppErrorKind::Validation(err) => write!(f, "validation error: {:?}", err),
        }?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<crate::database::error::DatabaseError> for AppError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_by_kind() {
        let not_found = AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
            payment_id: "p1".to_string(),
        }));
        assert_eq!(not_found.status_code(), 404);

        let missing = AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: "email".to_string(),
        }));
        assert_eq!(missing.status_code(), 400);

        let provider = AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: "cardgate".to_string(),
            message: "HTTP 500".to_string(),
            is_retryable: true,
        }));
        assert_eq!(provider.status_code(), 502);
        assert!(provider.is_retryable());
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let db = AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: "connection refused to 10.0.0.5:5432".to_string(),
            is_retryable: true,
        }));
        assert!(!db.user_message().contains("10.0.0.5"));
    }

    #[test]
    fn token_expiry_maps_to_gone() {
        let expired = AppError::new(AppErrorKind::Domain(DomainError::TokenExpired {
            order_number: "TO-2318".to_string(),
        }));
        assert_eq!(expired.status_code(), 410);
        assert_eq!(expired.error_code(), ErrorCode::TokenExpired);
    }
}
