//! Delayed-job scheduling for status polling and link expiry.
//!
//! Jobs are durable rows consumed by the worker pool in `workers::job_runner`.
//! Scheduling is idempotent: the deterministic key
//! `provider:external_ref:checkpoint` collapses duplicate submissions.

use crate::config::SchedulerConfig;
use crate::database::error::DatabaseError;
use crate::database::job_repository::{JobRepository, NewJob};
use crate::database::payment_repository::PaymentRecord;
use crate::payments::types::ProviderName;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    StatusCheck,
    ExpiryRevoke,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::StatusCheck => "status_check",
            JobKind::ExpiryRevoke => "expiry_revoke",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "status_check" => Some(JobKind::StatusCheck),
            "expiry_revoke" => Some(JobKind::ExpiryRevoke),
            _ => None,
        }
    }
}

/// Which scheduled pass a job belongs to. Part of the idempotency key, so
/// the short and long status checks coexist while re-submissions of either
/// collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Short,
    Long,
    Expiry,
}

impl Checkpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::Short => "short",
            Checkpoint::Long => "long",
            Checkpoint::Expiry => "expiry",
        }
    }
}

/// Deterministic idempotency key for a scheduled job.
pub fn idempotency_key(provider: ProviderName, external_ref: &str, checkpoint: Checkpoint) -> String {
    format!("{}:{}:{}", provider.as_str(), external_ref, checkpoint.as_str())
}

/// Exponential retry backoff: `base * 2^attempts`, capped at one hour.
pub fn backoff_delay(base: Duration, attempts: i32) -> Duration {
    let shift = attempts.clamp(0, 16) as u32;
    let delay = base.saturating_mul(1u32 << shift.min(16));
    delay.min(Duration::from_secs(3600))
}

/// When the expiry-revoke job should fire for a link expiring at
/// `expires_at`: the safety margin before the provider's own expiry, but
/// never in the past.
pub fn revoke_due_at(
    expires_at: DateTime<Utc>,
    safety_margin: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let due = expires_at - ChronoDuration::from_std(safety_margin).unwrap_or_else(|_| ChronoDuration::zero());
    due.max(now)
}

pub struct JobScheduler {
    repo: JobRepository,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(repo: JobRepository, config: SchedulerConfig) -> Self {
        Self { repo, config }
    }

    /// Schedule the standard follow-up jobs for a freshly created payment
    /// link: two status checks, plus an expiry-revoke when the adapter can
    /// revoke and the provider reported an expiry.
    pub async fn schedule_for_payment(
        &self,
        payment: &PaymentRecord,
        provider: ProviderName,
        supports_revoke: bool,
    ) -> Result<(), DatabaseError> {
        let external_ref = match payment.external_ref.as_deref() {
            Some(r) if !r.is_empty() => r,
            _ => {
                debug!(payment_id = %payment.id, "no external ref, skipping job scheduling");
                return Ok(());
            }
        };
        let now = Utc::now();

        self.submit(
            JobKind::StatusCheck,
            payment.id,
            provider,
            external_ref,
            Checkpoint::Short,
            now + ChronoDuration::from_std(self.config.status_check_short).unwrap_or_else(|_| ChronoDuration::zero()),
        )
        .await?;

        self.submit(
            JobKind::StatusCheck,
            payment.id,
            provider,
            external_ref,
            Checkpoint::Long,
            now + ChronoDuration::from_std(self.config.status_check_long).unwrap_or_else(|_| ChronoDuration::zero()),
        )
        .await?;

        if supports_revoke {
            if let Some(expires_at) = payment.expires_at {
                let due = revoke_due_at(expires_at, self.config.expiry_safety_margin, now);
                self.submit(
                    JobKind::ExpiryRevoke,
                    payment.id,
                    provider,
                    external_ref,
                    Checkpoint::Expiry,
                    due,
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn submit(
        &self,
        kind: JobKind,
        payment_id: Uuid,
        provider: ProviderName,
        external_ref: &str,
        checkpoint: Checkpoint,
        due_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let job = NewJob {
            kind: kind.as_str().to_string(),
            payment_id,
            provider: provider.as_str().to_string(),
            external_ref: external_ref.to_string(),
            checkpoint: checkpoint.as_str().to_string(),
            due_at,
            max_attempts: self.config.max_attempts,
            idempotency_key: idempotency_key(provider, external_ref, checkpoint),
        };

        match self.repo.schedule(&job).await? {
            Some(record) => {
                info!(
                    job_id = %record.id,
                    kind = %record.kind,
                    checkpoint = %record.checkpoint,
                    due_at = %record.due_at,
                    "job scheduled"
                );
            }
            None => {
                debug!(
                    idempotency_key = %job.idempotency_key,
                    "job already scheduled, duplicate submission ignored"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_deterministic() {
        let a = idempotency_key(ProviderName::SwiftPay, "qp_42", Checkpoint::Short);
        let b = idempotency_key(ProviderName::SwiftPay, "qp_42", Checkpoint::Short);
        assert_eq!(a, b);
        assert_eq!(a, "swiftpay:qp_42:short");

        let other = idempotency_key(ProviderName::SwiftPay, "qp_42", Checkpoint::Long);
        assert_ne!(a, other);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(30);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(120));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(30);
        assert_eq!(backoff_delay(base, 12), Duration::from_secs(3600));
    }

    #[test]
    fn revoke_fires_before_provider_expiry() {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::minutes(30);
        let due = revoke_due_at(expires_at, Duration::from_secs(120), now);
        assert_eq!(due, expires_at - ChronoDuration::minutes(2));
        assert_eq!((due - now).num_minutes(), 28);
    }

    #[test]
    fn revoke_due_never_in_the_past() {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(30); // inside the margin
        let due = revoke_due_at(expires_at, Duration::from_secs(120), now);
        assert_eq!(due, now);
    }
}
