use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Token acquisition failed for {provider}: {message}")]
    TokenAcquisitionError { provider: String, message: String },

    #[error("Reference {reference} not found at {provider}")]
    NotFound { provider: String, reference: String },

    #[error("Provider {provider} does not support link revocation")]
    RevokeUnsupported { provider: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::TokenAcquisitionError { .. } => true,
            PaymentError::NotFound { .. } => false,
            PaymentError::RevokeUnsupported { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    /// The provider reported the referenced link/session no longer exists.
    pub fn is_gone(&self) -> bool {
        matches!(self, PaymentError::NotFound { .. })
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::TokenAcquisitionError { .. } => 502,
            PaymentError::NotFound { .. } => 404,
            PaymentError::RevokeUnsupported { .. } => 400,
            PaymentError::ProviderError { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::NetworkError { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to payment provider. Please retry shortly".to_string()
            }
            PaymentError::TokenAcquisitionError { provider, .. } => {
                format!("Could not authenticate with {}", provider)
            }
            PaymentError::NotFound { .. } => "Payment reference not found".to_string(),
            PaymentError::RevokeUnsupported { .. } => {
                "This payment method cannot be revoked".to_string()
            }
            PaymentError::ProviderError { .. } => "Payment provider returned an error".to_string(),
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        let provider = match &err {
            PaymentError::TokenAcquisitionError { provider, .. }
            | PaymentError::NotFound { provider, .. }
            | PaymentError::RevokeUnsupported { provider }
            | PaymentError::ProviderError { provider, .. } => provider.clone(),
            _ => "payments".to_string(),
        };

        AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider,
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            PaymentError::ValidationError {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::RateLimitError {
                message: "limited".to_string(),
                retry_after_seconds: Some(30)
            }
            .http_status_code(),
            429
        );
        assert_eq!(
            PaymentError::NotFound {
                provider: "linkpay".to_string(),
                reference: "pl_1".to_string()
            }
            .http_status_code(),
            404
        );
    }

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(PaymentError::TokenAcquisitionError {
            provider: "swiftpay".to_string(),
            message: "500".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::NotFound {
            provider: "linkpay".to_string(),
            reference: "pl_1".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn gone_detection_only_matches_not_found() {
        assert!(PaymentError::NotFound {
            provider: "swiftpay".to_string(),
            reference: "qp_9".to_string()
        }
        .is_gone());
        assert!(!PaymentError::NetworkError {
            message: "reset".to_string()
        }
        .is_gone());
    }
}
