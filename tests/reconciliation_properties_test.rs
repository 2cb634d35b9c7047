//! Engine-level properties that hold without a running database: status
//! normalization, fan-out row shaping, job idempotency keys, and expiry
//! scheduling arithmetic.

use bigdecimal::BigDecimal;
use chrono::{Duration as ChronoDuration, Utc};
use paylink_backend::payments::error::PaymentError;
use paylink_backend::payments::normalize::{normalize, normalize_link};
use paylink_backend::payments::types::{LinkResult, LinkStatus, PaymentState, ProviderName};
use paylink_backend::scheduler::{idempotency_key, revoke_due_at, Checkpoint};
use paylink_backend::services::fanout::attempt_from_outcome;
use paylink_backend::services::reconciliation::{revoke_action, RevokeAction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[test]
fn redirect_gateway_vocabulary_normalizes_as_documented() {
    assert_eq!(
        normalize(ProviderName::LinkPay, "Activated"),
        PaymentState::Pending
    );
    assert_eq!(
        normalize(ProviderName::LinkPay, "Completed"),
        PaymentState::Completed
    );
}

#[test]
fn normalization_is_pure_across_every_provider() {
    let samples = [
        (ProviderName::LinkPay, "Expired"),
        (ProviderName::SwiftPay, "CAPTURED"),
        (ProviderName::CardGate, "paid"),
        (ProviderName::WalletGo, "timeout"),
        (ProviderName::CoinPay, "Settled"),
    ];
    for (provider, raw) in samples {
        let first = normalize(provider, raw);
        for _ in 0..5 {
            assert_eq!(normalize(provider, raw), first);
        }
    }
}

#[test]
fn dual_status_provider_feeds_both_dimensions() {
    assert_eq!(
        normalize(ProviderName::SwiftPay, "CAPTURED"),
        PaymentState::Completed
    );
    assert_eq!(
        normalize_link(ProviderName::SwiftPay, "SessionExpired"),
        Some(LinkStatus::Expired)
    );
}

#[test]
fn mixed_fanout_outcome_yields_one_row_per_adapter() {
    let order_id = Uuid::new_v4();
    let amount = BigDecimal::from(500);

    let success = Ok(LinkResult {
        url: "https://pay.example/a".to_string(),
        external_ref: Some("a_1".to_string()),
        raw_status: "Created".to_string(),
        expires_at: None,
        amount_submitted: amount.clone(),
    });
    let failure = Err(PaymentError::ProviderError {
        provider: "swiftpay".to_string(),
        message: "HTTP 500".to_string(),
        provider_code: Some("500".to_string()),
        retryable: true,
    });

    let row_a = attempt_from_outcome(order_id, ProviderName::LinkPay, &amount, &success);
    let row_b = attempt_from_outcome(order_id, ProviderName::SwiftPay, &amount, &failure);

    assert_eq!(row_a.link_status, "success");
    assert!(row_a.link_url.is_some());
    assert_eq!(row_b.link_status, "failed");
    assert!(row_b.link_url.is_none());
    assert_eq!(row_a.order_id, row_b.order_id);
}

#[test]
fn duplicate_job_submissions_share_one_idempotency_key() {
    let first = idempotency_key(ProviderName::CardGate, "cs_77", Checkpoint::Long);
    let second = idempotency_key(ProviderName::CardGate, "cs_77", Checkpoint::Long);
    assert_eq!(first, second);

    // Different checkpoints stay distinct jobs.
    assert_ne!(
        first,
        idempotency_key(ProviderName::CardGate, "cs_77", Checkpoint::Short)
    );
}

#[test]
fn thirty_minute_expiry_schedules_revoke_after_twenty_eight() {
    let now = Utc::now();
    let expires_at = now + ChronoDuration::minutes(30);
    let due = revoke_due_at(expires_at, Duration::from_secs(120), now);
    assert_eq!((due - now).num_minutes(), 28);
}

#[test]
fn completed_payment_short_circuits_expiry_revoke() {
    assert_eq!(
        revoke_action(PaymentState::Completed),
        RevokeAction::SkipTerminal
    );
    assert_eq!(
        revoke_action(PaymentState::Pending),
        RevokeAction::CallProvider
    );
}

#[test]
fn gone_provider_response_counts_as_expiry_not_error() {
    let gone = PaymentError::NotFound {
        provider: "swiftpay".to_string(),
        reference: "qp_1".to_string(),
    };
    assert!(gone.is_gone());
    assert!(!gone.is_retryable());

    let server_error = PaymentError::ProviderError {
        provider: "swiftpay".to_string(),
        message: "HTTP 502".to_string(),
        provider_code: Some("502".to_string()),
        retryable: true,
    };
    assert!(!server_error.is_gone());
}

#[test]
fn provider_names_parse_from_configuration_strings() {
    for name in ["linkpay", "swiftpay", "cardgate", "walletgo", "coinpay"] {
        assert!(ProviderName::from_str(name).is_ok());
    }
    assert!(ProviderName::from_str("legacy-gateway").is_err());
}
