//! Reconciliation of gateway-reported status into the canonical records.
//!
//! Both scheduled jobs and the operator-triggered manual re-check funnel
//! through the same path: poll the adapter, normalize, append an audit row
//! and mirror it onto the payment in one transaction.

use crate::database::job_repository::JobRecord;
use crate::database::payment_repository::{PaymentRecord, PaymentRepository};
use crate::error::{AppError, AppErrorKind, DomainError};
use crate::payments::error::PaymentError;
use crate::payments::normalize::{normalize, normalize_link};
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{PaymentState, ProviderName};
use crate::scheduler::JobKind;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Typed errors produced by reconciliation passes.
///
/// The job runner treats every variant as a failed attempt; only the
/// retryable ones are worth re-queueing, the rest burn through the attempt
/// budget and end up abandoned for operator follow-up.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("payment {0} not found")]
    PaymentMissing(Uuid),

    #[error("payment {payment_id} has no external reference")]
    MissingExternalRef { payment_id: Uuid },

    #[error("unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("database error: {0}")]
    Database(#[from] crate::database::error::DatabaseError),

    #[error("provider error: {0}")]
    Provider(#[from] PaymentError),
}

impl ReconcileError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Database(e) => e.is_retryable(),
            ReconcileError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// What an expiry-revoke pass should do, decided before any provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeAction {
    /// Link may still be paid against; call the provider.
    CallProvider,
    /// Payment already reached a terminal state; record a no-op and skip the
    /// provider entirely.
    SkipTerminal,
}

pub fn revoke_action(state: PaymentState) -> RevokeAction {
    if state.is_terminal() {
        RevokeAction::SkipTerminal
    } else {
        RevokeAction::CallProvider
    }
}

pub struct ReconciliationService {
    registry: Arc<ProviderRegistry>,
    payments: PaymentRepository,
}

impl ReconciliationService {
    pub fn new(registry: Arc<ProviderRegistry>, payments: PaymentRepository) -> Self {
        Self { registry, payments }
    }

    /// Entry point for the job runner.
    pub async fn run_job(&self, job: &JobRecord) -> Result<PaymentState, ReconcileError> {
        match JobKind::from_db(&job.kind) {
            Some(JobKind::StatusCheck) => self.run_status_check(job.payment_id).await,
            Some(JobKind::ExpiryRevoke) => self.run_expiry_revoke(job.payment_id).await,
            None => Err(ReconcileError::UnknownJobKind(job.kind.clone())),
        }
    }

    /// Poll the adapter and apply the result. Skips payments that already
    /// finished for good; `error` stays eligible so a later check can move it
    /// forward.
    pub async fn run_status_check(
        &self,
        payment_id: Uuid,
    ) -> Result<PaymentState, ReconcileError> {
        let payment = self.load(payment_id).await?;
        let current = current_state(&payment);

        if current.is_final() {
            info!(
                payment_id = %payment_id,
                state = %current,
                "status check skipped, payment already final"
            );
            return Ok(current);
        }

        let (provider_name, external_ref) = self.provider_ref(&payment)?;
        let provider = self.registry.get(provider_name)?;

        let raw = provider.check_status(&external_ref).await?;
        let normalized = normalize(provider_name, &raw.payment_status);
        let link = raw
            .link_status
            .as_deref()
            .and_then(|s| normalize_link(provider_name, s));

        self.payments
            .record_status(
                payment_id,
                &raw.payment_status,
                normalized.as_str(),
                link.map(|l| l.as_str()),
                "scheduled status check",
                raw.observed_at,
            )
            .await?;

        info!(
            payment_id = %payment_id,
            provider = %provider_name,
            raw = %raw.payment_status,
            normalized = %normalized,
            "payment status reconciled"
        );
        Ok(normalized)
    }

    /// Revoke a still-open link shortly before the provider's own expiry.
    ///
    /// A not-found/gone response means the link already disappeared on the
    /// provider side and counts as a successful expiry.
    pub async fn run_expiry_revoke(
        &self,
        payment_id: Uuid,
    ) -> Result<PaymentState, ReconcileError> {
        let payment = self.load(payment_id).await?;
        let current = current_state(&payment);

        if revoke_action(current) == RevokeAction::SkipTerminal {
            self.payments
                .record_status(
                    payment_id,
                    current.as_str(),
                    current.as_str(),
                    None,
                    "expiry revoke skipped, payment already terminal",
                    Utc::now(),
                )
                .await?;
            info!(
                payment_id = %payment_id,
                state = %current,
                "expiry revoke skipped"
            );
            return Ok(current);
        }

        let (provider_name, external_ref) = self.provider_ref(&payment)?;
        let provider = self.registry.get(provider_name)?;

        let (raw, message) = match provider.revoke(&external_ref).await {
            Ok(()) => ("revoked", "link revoked ahead of provider expiry"),
            Err(e) if e.is_gone() => ("gone", "link already gone at provider, treated as expired"),
            Err(PaymentError::RevokeUnsupported { .. }) => {
                // Scheduling is gated on supports_revoke, so this is a wiring
                // bug rather than a provider failure.
                warn!(
                    payment_id = %payment_id,
                    provider = %provider_name,
                    "expiry revoke scheduled for non-revocable provider"
                );
                return Ok(current);
            }
            Err(e) => return Err(e.into()),
        };

        self.payments
            .record_status(
                payment_id,
                raw,
                PaymentState::Expired.as_str(),
                None,
                message,
                Utc::now(),
            )
            .await?;

        info!(
            payment_id = %payment_id,
            provider = %provider_name,
            outcome = raw,
            "payment link expired"
        );
        Ok(PaymentState::Expired)
    }

    /// Operator-triggered synchronous re-check outside the schedule.
    pub async fn manual_check(&self, payment_id: Uuid) -> Result<PaymentState, AppError> {
        self.run_status_check(payment_id)
            .await
            .map_err(|e| match e {
                ReconcileError::PaymentMissing(id) => {
                    AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
                        payment_id: id.to_string(),
                    }))
                }
                ReconcileError::Database(db) => db.into(),
                ReconcileError::Provider(p) => p.into(),
                other => AppError::new(AppErrorKind::Infrastructure(
                    crate::error::InfrastructureError::Configuration {
                        message: other.to_string(),
                    },
                )),
            })
    }

    async fn load(&self, payment_id: Uuid) -> Result<PaymentRecord, ReconcileError> {
        self.payments
            .find_by_id(payment_id)
            .await?
            .ok_or(ReconcileError::PaymentMissing(payment_id))
    }

    fn provider_ref(
        &self,
        payment: &PaymentRecord,
    ) -> Result<(ProviderName, String), ReconcileError> {
        let provider = ProviderName::from_str(&payment.provider)?;
        let external_ref = payment
            .external_ref
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or(ReconcileError::MissingExternalRef {
                payment_id: payment.id,
            })?;
        Ok((provider, external_ref))
    }
}

fn current_state(payment: &PaymentRecord) -> PaymentState {
    PaymentState::from_db_status(&payment.payment_status).unwrap_or(PaymentState::Error)
}
