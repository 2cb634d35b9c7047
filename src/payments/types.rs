use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed set of supported payment gateways.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    /// Redirect payment-link gateway (static API key)
    LinkPay,
    /// Mobile quick-payment gateway (OAuth2 client credentials)
    SwiftPay,
    /// Hosted card checkout
    CardGate,
    /// Alternate wallet checkout
    WalletGo,
    /// Crypto invoice gateway
    CoinPay,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::LinkPay => "linkpay",
            ProviderName::SwiftPay => "swiftpay",
            ProviderName::CardGate => "cardgate",
            ProviderName::WalletGo => "walletgo",
            ProviderName::CoinPay => "coinpay",
        }
    }

    pub fn all() -> &'static [ProviderName] {
        &[
            ProviderName::LinkPay,
            ProviderName::SwiftPay,
            ProviderName::CardGate,
            ProviderName::WalletGo,
            ProviderName::CoinPay,
        ]
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "linkpay" => Ok(ProviderName::LinkPay),
            "swiftpay" => Ok(ProviderName::SwiftPay),
            "cardgate" => Ok(ProviderName::CardGate),
            "walletgo" => Ok(ProviderName::WalletGo),
            "coinpay" => Ok(ProviderName::CoinPay),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

/// Canonical, provider-agnostic payment lifecycle.
///
/// `created → pending → {completed | expired | cancelled | error}`.
/// The four target states are terminal; `error` stays eligible for later
/// scheduled re-checks, the other three short-circuit all scheduled work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Created,
    Pending,
    Completed,
    Expired,
    Cancelled,
    Error,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Created => "created",
            PaymentState::Pending => "pending",
            PaymentState::Completed => "completed",
            PaymentState::Expired => "expired",
            PaymentState::Cancelled => "cancelled",
            PaymentState::Error => "error",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "created" => Some(PaymentState::Created),
            "pending" => Some(PaymentState::Pending),
            "completed" => Some(PaymentState::Completed),
            "expired" => Some(PaymentState::Expired),
            "cancelled" => Some(PaymentState::Cancelled),
            "error" => Some(PaymentState::Error),
            _ => None,
        }
    }

    /// States no scheduled or manual check may leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Completed
                | PaymentState::Expired
                | PaymentState::Cancelled
                | PaymentState::Error
        )
    }

    /// Terminal states that also stop future polling. `error` is excluded:
    /// a later scheduled check may still move it forward.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            PaymentState::Completed | PaymentState::Expired | PaymentState::Cancelled
        )
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the gateway accepted the link-creation call itself, independent of
/// whether money ever moved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Success,
    Failed,
    Expired,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Success => "success",
            LinkStatus::Failed => "failed",
            LinkStatus::Expired => "expired",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "pending" => Some(LinkStatus::Pending),
            "success" => Some(LinkStatus::Success),
            "failed" => Some(LinkStatus::Failed),
            "expired" => Some(LinkStatus::Expired),
            _ => None,
        }
    }
}

/// The slice of an order each adapter needs to create a payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOrder {
    pub order_id: uuid::Uuid,
    pub order_number: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub description: Option<String>,
}

impl CheckoutOrder {
    pub fn validate(&self) -> Result<(), PaymentError> {
        validate_positive_amount(&self.amount, "amount")?;
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

pub fn validate_positive_amount(amount: &BigDecimal, field: &str) -> Result<(), PaymentError> {
    if amount <= &BigDecimal::from(0) {
        return Err(PaymentError::ValidationError {
            message: "amount must be greater than zero".to_string(),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

/// Successful outcome of `create_link`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResult {
    pub url: String,
    /// Provider-assigned reference (`payid`) used for later status/revoke calls
    pub external_ref: Option<String>,
    /// Provider-native status string as returned, pre-normalization
    pub raw_status: String,
    /// Absolute expiry of the link, when the provider reports one
    pub expires_at: Option<DateTime<Utc>>,
    /// Amount actually submitted to the gateway, after the provider's fee markup
    pub amount_submitted: BigDecimal,
}

/// Provider-native status snapshot from `check_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatus {
    pub provider: ProviderName,
    /// Provider vocabulary for the money movement
    pub payment_status: String,
    /// Some gateways report the link/session state separately in the same
    /// response; absent for single-status providers
    pub link_status: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Provider fee markup applied before submitting an amount.
///
/// Two shapes exist in the wild: percentage-plus-fixed gateways gross the
/// amount up so the merchant nets the original total, percentage-only
/// gateways add a flat markup.
#[derive(Debug, Clone)]
pub enum FeeSchedule {
    None,
    /// `(amount + fixed) / (1 - percentage)`
    PercentagePlusFixed {
        percentage: BigDecimal,
        fixed: BigDecimal,
    },
    /// `amount * (1 + percentage)`
    PercentageOnly { percentage: BigDecimal },
}

impl FeeSchedule {
    /// Gross amount to submit so the provider's cut is covered.
    pub fn apply(&self, amount: &BigDecimal) -> BigDecimal {
        match self {
            FeeSchedule::None => amount.clone(),
            FeeSchedule::PercentagePlusFixed { percentage, fixed } => {
                (amount + fixed) / (BigDecimal::from(1) - percentage)
            }
            FeeSchedule::PercentageOnly { percentage } => {
                amount * (BigDecimal::from(1) + percentage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn provider_name_round_trips() {
        for provider in ProviderName::all() {
            assert_eq!(
                ProviderName::from_str(provider.as_str()).unwrap(),
                *provider
            );
        }
        assert!(ProviderName::from_str("unknown").is_err());
    }

    #[test]
    fn final_states_are_a_subset_of_terminal() {
        for state in [
            PaymentState::Created,
            PaymentState::Pending,
            PaymentState::Completed,
            PaymentState::Expired,
            PaymentState::Cancelled,
            PaymentState::Error,
        ] {
            if state.is_final() {
                assert!(state.is_terminal());
            }
        }
        assert!(PaymentState::Error.is_terminal());
        assert!(!PaymentState::Error.is_final());
    }

    #[test]
    fn percentage_plus_fixed_grosses_up() {
        // 2.9% + 0.30 on 100.00 => (100.30) / 0.971
        let schedule = FeeSchedule::PercentagePlusFixed {
            percentage: BigDecimal::from_str("0.029").unwrap(),
            fixed: BigDecimal::from_str("0.30").unwrap(),
        };
        let gross = schedule.apply(&BigDecimal::from(100));
        let expected = BigDecimal::from_str("100.30").unwrap()
            / BigDecimal::from_str("0.971").unwrap();
        assert_eq!(gross, expected);
    }

    #[test]
    fn percentage_only_adds_markup() {
        let schedule = FeeSchedule::PercentageOnly {
            percentage: BigDecimal::from_str("0.015").unwrap(),
        };
        let gross = schedule.apply(&BigDecimal::from(200));
        assert_eq!(gross, BigDecimal::from_str("203.000").unwrap());
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(validate_positive_amount(&BigDecimal::from(0), "amount").is_err());
        assert!(validate_positive_amount(&BigDecimal::from(10), "amount").is_ok());
    }
}
