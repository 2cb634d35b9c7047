use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One fan-out attempt against one gateway. Created exactly once per
/// (order, provider) pair and never deleted; status fields are mutated only
/// through `record_status` or the manual-review setter.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub amount: BigDecimal,
    pub external_ref: Option<String>,
    pub link_url: Option<String>,
    pub link_status: String,
    pub payment_status: String,
    pub status_updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub order_id: Uuid,
    pub provider: String,
    pub amount: BigDecimal,
    pub external_ref: Option<String>,
    pub link_url: Option<String>,
    pub link_status: String,
    pub payment_status: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Append-only audit row; the latest row per payment determines the mirrored
/// status fields on the payment itself.
#[derive(Debug, Clone, FromRow)]
pub struct StatusAuditRecord {
    pub id: i64,
    pub payment_id: Uuid,
    pub observed_at: DateTime<Utc>,
    pub raw_status: String,
    pub normalized_status: String,
    pub message: String,
}

/// A still-usable payment link surfaced to the customer status endpoint.
#[derive(Debug, Clone, FromRow)]
pub struct ActiveLink {
    pub provider: String,
    pub link_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_attempt(
        &self,
        attempt: &NewPaymentAttempt,
    ) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(
            "INSERT INTO payments (
                 id, order_id, provider, amount, external_ref, link_url,
                 link_status, payment_status, status_updated_at, expires_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), $9)
             RETURNING id, order_id, provider, amount, external_ref, link_url,
                       link_status, payment_status, status_updated_at, expires_at,
                       reviewed, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(attempt.order_id)
        .bind(&attempt.provider)
        .bind(&attempt.amount)
        .bind(&attempt.external_ref)
        .bind(&attempt.link_url)
        .bind(&attempt.link_status)
        .bind(&attempt.payment_status)
        .bind(attempt.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, order_id, provider, amount, external_ref, link_url,
                    link_status, payment_status, status_updated_at, expires_at,
                    reviewed, created_at
             FROM payments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, order_id, provider, amount, external_ref, link_url,
                    link_status, payment_status, status_updated_at, expires_at,
                    reviewed, created_at
             FROM payments WHERE order_id = $1
             ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Links the customer can still pay against: creation succeeded, the
    /// payment has not finished, and the provider expiry has not passed.
    pub async fn active_links_for_order(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActiveLink>, DatabaseError> {
        sqlx::query_as::<_, ActiveLink>(
            "SELECT provider, link_url, expires_at
             FROM payments
             WHERE order_id = $1
               AND link_status = 'success'
               AND link_url IS NOT NULL
               AND payment_status IN ('created', 'pending')
               AND (expires_at IS NULL OR expires_at > $2)
             ORDER BY provider ASC",
        )
        .bind(order_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Append an audit row and mirror its normalized status onto the payment
    /// in the same transaction.
    ///
    /// The mirror update is guarded by `observed_at`: a delayed short-horizon
    /// check that lands after the long-horizon one cannot roll the payment
    /// back (last writer by timestamp, not by arrival). The audit row itself
    /// is always appended.
    pub async fn record_status(
        &self,
        payment_id: Uuid,
        raw_status: &str,
        normalized_status: &str,
        link_status: Option<&str>,
        message: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<StatusAuditRecord, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let audit = sqlx::query_as::<_, StatusAuditRecord>(
            "INSERT INTO status_audits (payment_id, observed_at, raw_status, normalized_status, message)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, payment_id, observed_at, raw_status, normalized_status, message",
        )
        .bind(payment_id)
        .bind(observed_at)
        .bind(raw_status)
        .bind(normalized_status)
        .bind(message)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "UPDATE payments
             SET payment_status = $2, status_updated_at = $3
             WHERE id = $1 AND status_updated_at <= $3",
        )
        .bind(payment_id)
        .bind(normalized_status)
        .bind(observed_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if let Some(link_status) = link_status {
            sqlx::query(
                "UPDATE payments
                 SET link_status = $2
                 WHERE id = $1 AND status_updated_at <= $3",
            )
            .bind(payment_id)
            .bind(link_status)
            .bind(observed_at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(audit)
    }

    pub async fn set_reviewed(
        &self,
        payment_id: Uuid,
        reviewed: bool,
    ) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(
            "UPDATE payments SET reviewed = $2
             WHERE id = $1
             RETURNING id, order_id, provider, amount, external_ref, link_url,
                       link_status, payment_status, status_updated_at, expires_at,
                       reviewed, created_at",
        )
        .bind(payment_id)
        .bind(reviewed)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn audits_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<StatusAuditRecord>, DatabaseError> {
        sqlx::query_as::<_, StatusAuditRecord>(
            "SELECT id, payment_id, observed_at, raw_status, normalized_status, message
             FROM status_audits
             WHERE payment_id = $1
             ORDER BY observed_at ASC, id ASC",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
