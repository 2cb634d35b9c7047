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
pub struct CoinPayConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub fee_percentage: BigDecimal,
}

impl CoinPayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key =
            std::env::var("COINPAY_API_KEY").map_err(|_| PaymentError::ValidationError {
                message: "COINPAY_API_KEY environment variable is required".to_string(),
                field: Some("COINPAY_API_KEY".to_string()),
            })?;

        Ok(Self {
            api_key,
            base_url: std::env::var("COINPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.coinpay.example".to_string()),
            timeout_secs: std::env::var("COINPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            max_retries: std::env::var("COINPAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            fee_percentage: std::env::var("COINPAY_FEE_PERCENTAGE")
                .ok()
                .and_then(|v| BigDecimal::from_str(&v).ok())
                .unwrap_or_else(|| BigDecimal::from_str("0.01").expect("static decimal")),
        })
    }
}

/// Crypto invoice gateway. Invoices carry their own on-chain settlement
/// window; an unpaid invoice simply expires, so no revoke call exists.
pub struct CoinPayProvider {
    config: CoinPayConfig,
    http: ProviderHttpClient,
    fees: FeeSchedule,
}

impl CoinPayProvider {
    pub fn new(config: CoinPayConfig) -> PaymentResult<Self> {
        let http =
            ProviderHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        let fees = FeeSchedule::PercentageOnly {
            percentage: config.fee_percentage.clone(),
        };
        Ok(Self { config, http, fees })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(CoinPayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentProvider for CoinPayProvider {
    async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult> {
        order.validate()?;
        let gross = self.fees.apply(&order.amount).round(2);

        let payload = serde_json::json!({
            "price": gross.to_string(),
            "currency": order.currency,
            "orderId": order.order_number,
            "itemDesc": order.description,
            "buyerEmail": order.customer_email,
        });

        let raw: CoinPayInvoiceResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/api/v1/invoices"),
                "coinpay",
                None,
                Some(&payload),
                &[
                    ("X-Access-Token", self.config.api_key.as_str()),
                    ("Content-Type", "application/json"),
                ],
            )
            .await?;

        info!(invoice_id = %raw.id, order = %order.order_number, "coinpay invoice created");

        Ok(LinkResult {
            url: raw.checkout_link,
            external_ref: Some(raw.id),
            raw_status: raw.status,
            expires_at: raw.expiration_time,
            amount_submitted: gross,
        })
    }

    async fn check_status(&self, external_ref: &str) -> PaymentResult<RawStatus> {
        let raw: CoinPayInvoiceResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/api/v1/invoices/{}", external_ref)),
                "coinpay",
                None,
                None,
                &[("X-Access-Token", self.config.api_key.as_str())],
            )
            .await?;

        Ok(RawStatus {
            provider: ProviderName::CoinPay,
            payment_status: raw.status,
            link_status: None,
            observed_at: Utc::now(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::CoinPay
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPayInvoiceResponse {
    id: String,
    #[serde(default)]
    checkout_link: String,
    status: String,
    #[serde(default)]
    expiration_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_response_parses() {
        let payload = serde_json::json!({
            "id": "inv_9",
            "checkoutLink": "https://pay.coinpay.example/i/inv_9",
            "status": "New",
            "expirationTime": "2026-03-01T12:15:00Z"
        });
        let parsed: CoinPayInvoiceResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.status, "New");
        assert!(parsed.expiration_time.is_some());
    }

    #[test]
    fn markup_applies_one_percent() {
        let provider = CoinPayProvider::new(CoinPayConfig {
            api_key: "cp_test".to_string(),
            base_url: "https://api.coinpay.example".to_string(),
            timeout_secs: 5,
            max_retries: 1,
            fee_percentage: BigDecimal::from_str("0.01").unwrap(),
        })
        .unwrap();
        let gross = provider.fees.apply(&BigDecimal::from(50)).round(2);
        assert_eq!(gross, BigDecimal::from_str("50.50").unwrap());
    }
}
