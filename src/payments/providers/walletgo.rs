use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::http::ProviderHttpClient;
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{CheckoutOrder, FeeSchedule, LinkResult, ProviderName, RawStatus};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct WalletGoConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub fee_percentage: BigDecimal,
}

impl WalletGoConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key =
            std::env::var("WALLETGO_API_KEY").map_err(|_| PaymentError::ValidationError {
                message: "WALLETGO_API_KEY environment variable is required".to_string(),
                field: Some("WALLETGO_API_KEY".to_string()),
            })?;

        Ok(Self {
            api_key,
            base_url: std::env::var("WALLETGO_BASE_URL")
                .unwrap_or_else(|_| "https://api.walletgo.example".to_string()),
            timeout_secs: std::env::var("WALLETGO_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            max_retries: std::env::var("WALLETGO_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            fee_percentage: std::env::var("WALLETGO_FEE_PERCENTAGE")
                .ok()
                .and_then(|v| BigDecimal::from_str(&v).ok())
                .unwrap_or_else(|| BigDecimal::from_str("0.015").expect("static decimal")),
        })
    }
}

/// Alternate-wallet checkout. Charges are one-shot: once created they either
/// confirm, decline or time out on the wallet side, so there is nothing to
/// revoke.
pub struct WalletGoProvider {
    config: WalletGoConfig,
    http: ProviderHttpClient,
    fees: FeeSchedule,
}

impl WalletGoProvider {
    pub fn new(config: WalletGoConfig) -> PaymentResult<Self> {
        let http =
            ProviderHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        let fees = FeeSchedule::PercentageOnly {
            percentage: config.fee_percentage.clone(),
        };
        Ok(Self { config, http, fees })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(WalletGoConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentProvider for WalletGoProvider {
    async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult> {
        order.validate()?;
        let gross = self.fees.apply(&order.amount).round(2);

        let payload = serde_json::json!({
            "amount": gross.to_string(),
            "currency": order.currency,
            "order_reference": order.order_number,
            "email": order.customer_email,
            "phone": order.customer_phone,
        });

        let raw: WalletGoChargeResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/api/v1/charges"),
                "walletgo",
                None,
                Some(&payload),
                &[
                    ("X-Api-Key", self.config.api_key.as_str()),
                    ("Content-Type", "application/json"),
                ],
            )
            .await?;

        info!(charge_id = %raw.charge_id, order = %order.order_number, "walletgo charge created");

        Ok(LinkResult {
            url: raw.payment_url,
            external_ref: Some(raw.charge_id),
            raw_status: raw.status,
            expires_at: None,
            amount_submitted: gross,
        })
    }

    async fn check_status(&self, external_ref: &str) -> PaymentResult<RawStatus> {
        let raw: WalletGoChargeResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/api/v1/charges/{}", external_ref)),
                "walletgo",
                None,
                None,
                &[("X-Api-Key", self.config.api_key.as_str())],
            )
            .await?;

        Ok(RawStatus {
            provider: ProviderName::WalletGo,
            payment_status: raw.status,
            link_status: None,
            observed_at: Utc::now(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::WalletGo
    }
}

#[derive(Debug, Deserialize)]
struct WalletGoChargeResponse {
    charge_id: String,
    #[serde(default)]
    payment_url: String,
    status: String,
}
