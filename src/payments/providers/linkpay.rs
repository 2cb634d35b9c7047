use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::http::ProviderHttpClient;
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{CheckoutOrder, LinkResult, ProviderName, RawStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct LinkPayConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LinkPayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.linkpay.example".to_string(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

impl LinkPayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key = std::env::var("LINKPAY_API_KEY").map_err(|_| PaymentError::ValidationError {
            message: "LINKPAY_API_KEY environment variable is required".to_string(),
            field: Some("LINKPAY_API_KEY".to_string()),
        })?;

        Ok(Self {
            api_key,
            base_url: std::env::var("LINKPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.linkpay.example".to_string()),
            timeout_secs: std::env::var("LINKPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            max_retries: std::env::var("LINKPAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

/// Redirect payment-link gateway. The customer follows a hosted URL; the link
/// itself is a live authorization that can be revoked until it completes.
pub struct LinkPayProvider {
    config: LinkPayConfig,
    http: ProviderHttpClient,
}

impl LinkPayProvider {
    pub fn new(config: LinkPayConfig) -> PaymentResult<Self> {
        let http =
            ProviderHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(LinkPayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentProvider for LinkPayProvider {
    async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult> {
        order.validate()?;

        let payload = serde_json::json!({
            "amount": order.amount.round(2).to_string(),
            "currency": order.currency,
            "reference": order.order_number,
            "description": order.description,
            "customerEmail": order.customer_email,
        });

        let raw: LinkPayCreateResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/paymentlinks"),
                "linkpay",
                None,
                Some(&payload),
                &[
                    ("X-API-Key", self.config.api_key.as_str()),
                    ("Content-Type", "application/json"),
                ],
            )
            .await?;

        info!(link_id = %raw.link_id, order = %order.order_number, "linkpay link created");

        Ok(LinkResult {
            url: raw.url,
            external_ref: Some(raw.link_id),
            raw_status: raw.status,
            expires_at: raw.expires_at,
            amount_submitted: order.amount.clone(),
        })
    }

    async fn check_status(&self, external_ref: &str) -> PaymentResult<RawStatus> {
        let raw: LinkPayStatusResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v1/paymentlinks/{}", external_ref)),
                "linkpay",
                None,
                None,
                &[("X-API-Key", self.config.api_key.as_str())],
            )
            .await?;

        Ok(RawStatus {
            provider: ProviderName::LinkPay,
            payment_status: raw.status,
            link_status: None,
            observed_at: Utc::now(),
        })
    }

    async fn revoke(&self, external_ref: &str) -> PaymentResult<()> {
        self.http
            .request_no_content(
                reqwest::Method::DELETE,
                &self.endpoint(&format!("/v1/paymentlinks/{}", external_ref)),
                "linkpay",
                None,
                None,
                &[("X-API-Key", self.config.api_key.as_str())],
            )
            .await?;
        info!(link_id = %external_ref, "linkpay link revoked");
        Ok(())
    }

    fn name(&self) -> ProviderName {
        ProviderName::LinkPay
    }

    fn supports_revoke(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkPayCreateResponse {
    link_id: String,
    url: String,
    status: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkPayStatusResponse {
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_response_parses_with_and_without_expiry() {
        let with_expiry = serde_json::json!({
            "linkId": "pl_123",
            "url": "https://pay.linkpay.example/pl_123",
            "status": "Created",
            "expiresAt": "2026-03-01T12:00:00Z"
        });
        let parsed: LinkPayCreateResponse = serde_json::from_value(with_expiry).unwrap();
        assert_eq!(parsed.link_id, "pl_123");
        assert!(parsed.expires_at.is_some());

        let without_expiry = serde_json::json!({
            "linkId": "pl_124",
            "url": "https://pay.linkpay.example/pl_124",
            "status": "Created"
        });
        let parsed: LinkPayCreateResponse = serde_json::from_value(without_expiry).unwrap();
        assert!(parsed.expires_at.is_none());
    }

    #[test]
    fn status_response_parses() {
        let parsed: LinkPayStatusResponse =
            serde_json::from_value(serde_json::json!({"status": "Activated"})).unwrap();
        assert_eq!(parsed.status, "Activated");
    }

    #[test]
    fn provider_reports_revoke_support() {
        let provider = LinkPayProvider::new(LinkPayConfig {
            api_key: "key_test".to_string(),
            ..LinkPayConfig::default()
        })
        .expect("provider init should succeed");
        assert!(provider.supports_revoke());
        assert_eq!(provider.name(), ProviderName::LinkPay);
    }
}
