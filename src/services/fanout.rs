//! Concurrent fan-out of one committed order to every enabled gateway.
//!
//! Each adapter branch runs independently: its outcome, success or failure,
//! becomes exactly one payment row, and no branch can prevent the others from
//! completing or being recorded. Dispatch is best-effort relative to order
//! creation; when every adapter fails the order still exists and the customer
//! keeps polling until a manual re-check or operator action succeeds.

use crate::database::payment_repository::{NewPaymentAttempt, PaymentRepository};
use crate::database::order_repository::OrderRecord;
use crate::payments::error::PaymentResult;
use crate::payments::normalize::normalize;
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{CheckoutOrder, LinkResult, LinkStatus, ProviderName};
use crate::scheduler::JobScheduler;
use bigdecimal::BigDecimal;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome counts for one dispatch, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct FanOutOrchestrator {
    registry: Arc<ProviderRegistry>,
    payments: PaymentRepository,
    scheduler: JobScheduler,
}

impl FanOutOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        payments: PaymentRepository,
        scheduler: JobScheduler,
    ) -> Self {
        Self {
            registry,
            payments,
            scheduler,
        }
    }

    /// Invoke every enabled adapter concurrently and persist one payment row
    /// per branch.
    pub async fn dispatch(&self, order: &OrderRecord) -> DispatchSummary {
        let checkout = CheckoutOrder {
            order_id: order.id,
            order_number: order.order_number.clone(),
            amount: order.total_amount.clone(),
            currency: order.currency.clone(),
            customer_email: order.email.clone(),
            customer_phone: order.phone.clone(),
            description: order.product_description.clone(),
        };

        let branches = self.registry.iter().map(|provider| {
            let checkout = checkout.clone();
            async move {
                let name = provider.name();
                let supports_revoke = provider.supports_revoke();
                let outcome = provider.create_link(&checkout).await;
                (name, supports_revoke, outcome)
            }
        });

        let outcomes = join_all(branches).await;

        let mut summary = DispatchSummary {
            succeeded: 0,
            failed: 0,
        };

        for (name, supports_revoke, outcome) in outcomes {
            match &outcome {
                Ok(link) => {
                    summary.succeeded += 1;
                    info!(
                        order = %order.order_number,
                        provider = %name,
                        external_ref = link.external_ref.as_deref().unwrap_or(""),
                        "payment link created"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        order = %order.order_number,
                        provider = %name,
                        error = %e,
                        "payment link creation failed"
                    );
                }
            }

            let attempt = attempt_from_outcome(order.id, name, &order.total_amount, &outcome);
            match self.payments.insert_attempt(&attempt).await {
                Ok(record) => {
                    if outcome.is_ok() {
                        if let Err(e) = self
                            .scheduler
                            .schedule_for_payment(&record, name, supports_revoke)
                            .await
                        {
                            error!(
                                payment_id = %record.id,
                                provider = %name,
                                error = %e,
                                "failed to schedule follow-up jobs"
                            );
                        }
                    }
                }
                Err(e) => {
                    // The attempt outcome is lost for this provider, but the
                    // sibling branches still record theirs.
                    error!(
                        order = %order.order_number,
                        provider = %name,
                        error = %e,
                        "failed to persist payment attempt"
                    );
                }
            }
        }

        info!(
            order = %order.order_number,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "fan-out dispatch complete"
        );
        summary
    }
}

/// Translate one adapter branch outcome into the payment row to persist.
///
/// Failures still produce a row: link status `failed`, canonical state
/// `error`, the originally requested amount, and no external reference.
pub fn attempt_from_outcome(
    order_id: Uuid,
    provider: ProviderName,
    requested_amount: &BigDecimal,
    outcome: &PaymentResult<LinkResult>,
) -> NewPaymentAttempt {
    match outcome {
        Ok(link) => NewPaymentAttempt {
            order_id,
            provider: provider.as_str().to_string(),
            amount: link.amount_submitted.clone(),
            external_ref: link.external_ref.clone(),
            link_url: Some(link.url.clone()),
            link_status: LinkStatus::Success.as_str().to_string(),
            payment_status: normalize(provider, &link.raw_status).as_str().to_string(),
            expires_at: link.expires_at,
        },
        Err(_) => NewPaymentAttempt {
            order_id,
            provider: provider.as_str().to_string(),
            amount: requested_amount.clone(),
            external_ref: None,
            link_url: None,
            link_status: LinkStatus::Failed.as_str().to_string(),
            payment_status: crate::payments::types::PaymentState::Error.as_str().to_string(),
            expires_at: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::error::PaymentError;
    use chrono::Utc;

    #[test]
    fn successful_branch_maps_to_success_row() {
        let order_id = Uuid::new_v4();
        let outcome = Ok(LinkResult {
            url: "https://pay.linkpay.example/pl_1".to_string(),
            external_ref: Some("pl_1".to_string()),
            raw_status: "Created".to_string(),
            expires_at: Some(Utc::now()),
            amount_submitted: BigDecimal::from(103),
        });
        let attempt =
            attempt_from_outcome(order_id, ProviderName::LinkPay, &BigDecimal::from(100), &outcome);
        assert_eq!(attempt.link_status, "success");
        assert_eq!(attempt.payment_status, "created");
        assert_eq!(attempt.amount, BigDecimal::from(103));
        assert_eq!(attempt.external_ref.as_deref(), Some("pl_1"));
    }

    #[test]
    fn failed_branch_maps_to_failed_row() {
        let order_id = Uuid::new_v4();
        let outcome: PaymentResult<LinkResult> = Err(PaymentError::ProviderError {
            provider: "cardgate".to_string(),
            message: "HTTP 500".to_string(),
            provider_code: Some("500".to_string()),
            retryable: true,
        });
        let attempt = attempt_from_outcome(
            order_id,
            ProviderName::CardGate,
            &BigDecimal::from(100),
            &outcome,
        );
        assert_eq!(attempt.link_status, "failed");
        assert_eq!(attempt.payment_status, "error");
        assert_eq!(attempt.amount, BigDecimal::from(100));
        assert!(attempt.external_ref.is_none());
        assert!(attempt.link_url.is_none());
    }

    #[test]
    fn every_branch_produces_exactly_one_row() {
        let order_id = Uuid::new_v4();
        let outcomes: Vec<(ProviderName, PaymentResult<LinkResult>)> = vec![
            (
                ProviderName::LinkPay,
                Ok(LinkResult {
                    url: "https://a".to_string(),
                    external_ref: Some("a1".to_string()),
                    raw_status: "Created".to_string(),
                    expires_at: None,
                    amount_submitted: BigDecimal::from(100),
                }),
            ),
            (
                ProviderName::SwiftPay,
                Err(PaymentError::NetworkError {
                    message: "timeout".to_string(),
                }),
            ),
            (
                ProviderName::CoinPay,
                Err(PaymentError::TokenAcquisitionError {
                    provider: "coinpay".to_string(),
                    message: "401".to_string(),
                }),
            ),
        ];

        let attempts: Vec<_> = outcomes
            .iter()
            .map(|(name, outcome)| {
                attempt_from_outcome(order_id, *name, &BigDecimal::from(100), outcome)
            })
            .collect();

        assert_eq!(attempts.len(), 3);
        assert_eq!(
            attempts.iter().filter(|a| a.link_status == "success").count(),
            1
        );
        assert_eq!(
            attempts.iter().filter(|a| a.link_status == "failed").count(),
            2
        );
    }
}
