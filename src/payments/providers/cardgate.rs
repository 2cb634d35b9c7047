use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::http::ProviderHttpClient;
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{CheckoutOrder, FeeSchedule, LinkResult, ProviderName, RawStatus};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CardGateConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Percentage component of the gateway fee, e.g. `0.029`
    pub fee_percentage: BigDecimal,
    /// Fixed component of the gateway fee in order currency
    pub fee_fixed: BigDecimal,
}

impl CardGateConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("CARDGATE_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "CARDGATE_SECRET_KEY environment variable is required".to_string(),
                field: Some("CARDGATE_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            secret_key,
            base_url: std::env::var("CARDGATE_BASE_URL")
                .unwrap_or_else(|_| "https://api.cardgate.example".to_string()),
            timeout_secs: std::env::var("CARDGATE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            max_retries: std::env::var("CARDGATE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            fee_percentage: std::env::var("CARDGATE_FEE_PERCENTAGE")
                .ok()
                .and_then(|v| BigDecimal::from_str(&v).ok())
                .unwrap_or_else(|| BigDecimal::from_str("0.029").expect("static decimal")),
            fee_fixed: std::env::var("CARDGATE_FEE_FIXED")
                .ok()
                .and_then(|v| BigDecimal::from_str(&v).ok())
                .unwrap_or_else(|| BigDecimal::from_str("0.30").expect("static decimal")),
        })
    }
}

/// Hosted card checkout. The gateway takes a percentage-plus-fixed cut, so
/// the submitted amount is grossed up to keep the merchant whole.
pub struct CardGateProvider {
    config: CardGateConfig,
    http: ProviderHttpClient,
    fees: FeeSchedule,
}

impl CardGateProvider {
    pub fn new(config: CardGateConfig) -> PaymentResult<Self> {
        let http =
            ProviderHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        let fees = FeeSchedule::PercentagePlusFixed {
            percentage: config.fee_percentage.clone(),
            fixed: config.fee_fixed.clone(),
        };
        Ok(Self { config, http, fees })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(CardGateConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentProvider for CardGateProvider {
    async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult> {
        order.validate()?;
        let gross = self.fees.apply(&order.amount).round(2);

        let payload = serde_json::json!({
            "amount": gross.to_string(),
            "currency": order.currency,
            "reference": order.order_number,
            "description": order.description,
            "customer_email": order.customer_email,
        });

        let raw: CardGateSessionResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v2/checkout/sessions"),
                "cardgate",
                Some(self.config.secret_key.as_str()),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        info!(
            session_id = %raw.id,
            order = %order.order_number,
            gross = %gross,
            "cardgate checkout session created"
        );

        Ok(LinkResult {
            url: raw.checkout_url,
            external_ref: Some(raw.id),
            raw_status: raw.status,
            expires_at: raw.expires_at,
            amount_submitted: gross,
        })
    }

    async fn check_status(&self, external_ref: &str) -> PaymentResult<RawStatus> {
        let raw: CardGateSessionResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v2/checkout/sessions/{}", external_ref)),
                "cardgate",
                Some(self.config.secret_key.as_str()),
                None,
                &[],
            )
            .await?;

        Ok(RawStatus {
            provider: ProviderName::CardGate,
            payment_status: raw.status,
            link_status: None,
            observed_at: Utc::now(),
        })
    }

    async fn revoke(&self, external_ref: &str) -> PaymentResult<()> {
        self.http
            .request_no_content(
                reqwest::Method::POST,
                &self.endpoint(&format!("/v2/checkout/sessions/{}/expire", external_ref)),
                "cardgate",
                Some(self.config.secret_key.as_str()),
                None,
                &[],
            )
            .await?;
        info!(session_id = %external_ref, "cardgate session expired");
        Ok(())
    }

    fn name(&self) -> ProviderName {
        ProviderName::CardGate
    }

    fn supports_revoke(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct CardGateSessionResponse {
    id: String,
    #[serde(default)]
    checkout_url: String,
    status: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CardGateConfig {
        CardGateConfig {
            secret_key: "sk_test".to_string(),
            base_url: "https://api.cardgate.example".to_string(),
            timeout_secs: 5,
            max_retries: 1,
            fee_percentage: BigDecimal::from_str("0.029").unwrap(),
            fee_fixed: BigDecimal::from_str("0.30").unwrap(),
        }
    }

    #[test]
    fn fee_gross_up_keeps_merchant_whole() {
        let provider = CardGateProvider::new(config()).unwrap();
        let amount = BigDecimal::from(100);
        let gross = provider.fees.apply(&amount).round(2);
        // net = gross - (gross * pct + fixed) must recover the original amount
        let net = (&gross - (&gross * BigDecimal::from_str("0.029").unwrap())
            - BigDecimal::from_str("0.30").unwrap())
        .round(2);
        assert_eq!(net, BigDecimal::from(100));
    }

    #[test]
    fn session_response_parses() {
        let payload = serde_json::json!({
            "id": "cs_55",
            "checkout_url": "https://checkout.cardgate.example/cs_55",
            "status": "open",
            "expires_at": "2026-03-01T13:00:00Z"
        });
        let parsed: CardGateSessionResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.status, "open");
        assert!(parsed.expires_at.is_some());
    }
}
