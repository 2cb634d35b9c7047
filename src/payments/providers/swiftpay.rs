use crate::payments::credentials::{
    ClientCredentialsExchange, CredentialCache, OAuthConfig, TokenExchange,
};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::http::ProviderHttpClient;
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{CheckoutOrder, LinkResult, ProviderName, RawStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SwiftPayConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl SwiftPayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let client_id = std::env::var("SWIFTPAY_CLIENT_ID").unwrap_or_default();
        let client_secret = std::env::var("SWIFTPAY_CLIENT_SECRET").unwrap_or_default();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "SWIFTPAY_CLIENT_ID and SWIFTPAY_CLIENT_SECRET are required".to_string(),
                field: Some("swiftpay".to_string()),
            });
        }
        Ok(Self {
            client_id,
            client_secret,
            base_url: std::env::var("SWIFTPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.swiftpay.example".to_string()),
            timeout_secs: std::env::var("SWIFTPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            max_retries: std::env::var("SWIFTPAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

/// Mobile quick-payment gateway authenticated via OAuth2 client credentials.
///
/// Status responses are dual: `paymentState` tracks the money movement while
/// `sessionState` tracks the checkout session itself; both dimensions are
/// reported upstream.
pub struct SwiftPayProvider {
    config: SwiftPayConfig,
    http: ProviderHttpClient,
    credentials: CredentialCache,
}

impl SwiftPayProvider {
    pub fn new(config: SwiftPayConfig) -> PaymentResult<Self> {
        let http =
            ProviderHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        let oauth = OAuthConfig {
            token_url: format!("{}/oauth2/token", config.base_url),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: Some("payments".to_string()),
        };
        let exchanger: Arc<dyn TokenExchange> = Arc::new(ClientCredentialsExchange::new(
            "swiftpay",
            oauth,
            http.clone(),
        ));
        Ok(Self {
            config,
            http,
            credentials: CredentialCache::new("swiftpay", exchanger),
        })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(SwiftPayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentProvider for SwiftPayProvider {
    async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult> {
        order.validate()?;
        let token = self.credentials.get_token().await?;

        let payload = serde_json::json!({
            "amount": {
                "value": order.amount.round(2).to_string(),
                "currency": order.currency,
            },
            "reference": order.order_number,
            "description": order.description,
            "customer": { "email": order.customer_email, "phone": order.customer_phone },
        });

        let raw: SwiftPayCreateResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/epayment/v1/payments"),
                "swiftpay",
                Some(token.as_str()),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        info!(reference = %raw.reference, order = %order.order_number, "swiftpay payment created");

        Ok(LinkResult {
            url: raw.redirect_url,
            external_ref: Some(raw.reference),
            raw_status: raw.state,
            expires_at: raw.expires_at,
            amount_submitted: order.amount.clone(),
        })
    }

    async fn check_status(&self, external_ref: &str) -> PaymentResult<RawStatus> {
        let token = self.credentials.get_token().await?;
        let raw: SwiftPayStatusResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/epayment/v1/payments/{}", external_ref)),
                "swiftpay",
                Some(token.as_str()),
                None,
                &[],
            )
            .await?;

        Ok(RawStatus {
            provider: ProviderName::SwiftPay,
            payment_status: raw.payment_state,
            link_status: raw.session_state,
            observed_at: Utc::now(),
        })
    }

    async fn revoke(&self, external_ref: &str) -> PaymentResult<()> {
        let token = self.credentials.get_token().await?;
        self.http
            .request_no_content(
                reqwest::Method::POST,
                &self.endpoint(&format!("/epayment/v1/payments/{}/cancel", external_ref)),
                "swiftpay",
                Some(token.as_str()),
                None,
                &[],
            )
            .await?;
        info!(reference = %external_ref, "swiftpay payment cancelled");
        Ok(())
    }

    fn name(&self) -> ProviderName {
        ProviderName::SwiftPay
    }

    fn supports_revoke(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwiftPayCreateResponse {
    reference: String,
    redirect_url: String,
    state: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwiftPayStatusResponse {
    payment_state: String,
    #[serde(default)]
    session_state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_carries_both_dimensions() {
        let payload = serde_json::json!({
            "paymentState": "CAPTURED",
            "sessionState": "PaymentInitiated"
        });
        let parsed: SwiftPayStatusResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.payment_state, "CAPTURED");
        assert_eq!(parsed.session_state.as_deref(), Some("PaymentInitiated"));
    }

    #[test]
    fn session_state_is_optional() {
        let payload = serde_json::json!({ "paymentState": "CREATED" });
        let parsed: SwiftPayStatusResponse = serde_json::from_value(payload).unwrap();
        assert!(parsed.session_state.is_none());
    }

    #[test]
    fn create_response_parses_expiry() {
        let payload = serde_json::json!({
            "reference": "qp_42",
            "redirectUrl": "https://pay.swiftpay.example/qp_42",
            "state": "CREATED",
            "expiresAt": "2026-03-01T12:30:00Z"
        });
        let parsed: SwiftPayCreateResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.reference, "qp_42");
        assert!(parsed.expires_at.is_some());
    }
}
