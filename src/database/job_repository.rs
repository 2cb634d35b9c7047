use crate::database::error::DatabaseError;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Durable delayed job owned by the scheduler.
///
/// `idempotency_key` is `provider:external_ref:checkpoint`; the unique
/// constraint turns duplicate scheduling into a no-op.
#[derive(Debug, Clone, FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: String,
    pub payment_id: Uuid,
    pub provider: String,
    pub external_ref: String,
    pub checkpoint: String,
    pub due_at: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub status: String,
    pub idempotency_key: String,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: String,
    pub payment_id: Uuid,
    pub provider: String,
    pub external_ref: String,
    pub checkpoint: String,
    pub due_at: DateTime<Utc>,
    pub max_attempts: i32,
    pub idempotency_key: String,
}

pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a job; returns `None` when a job with the same idempotency key
    /// already exists.
    pub async fn schedule(&self, job: &NewJob) -> Result<Option<JobRecord>, DatabaseError> {
        sqlx::query_as::<_, JobRecord>(
            "INSERT INTO scheduled_jobs (
                 id, kind, payment_id, provider, external_ref, checkpoint,
                 due_at, attempts, max_attempts, status, idempotency_key
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, 'pending', $9)
             ON CONFLICT (idempotency_key) DO NOTHING
             RETURNING id, kind, payment_id, provider, external_ref, checkpoint,
                       due_at, attempts, max_attempts, status, idempotency_key,
                       last_error, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&job.kind)
        .bind(job.payment_id)
        .bind(&job.provider)
        .bind(&job.external_ref)
        .bind(&job.checkpoint)
        .bind(job.due_at)
        .bind(job.max_attempts)
        .bind(&job.idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Claim one due job for execution.
    ///
    /// `FOR UPDATE SKIP LOCKED` lets parallel workers drain the queue without
    /// ever handing the same job to two of them.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<JobRecord>, DatabaseError> {
        sqlx::query_as::<_, JobRecord>(
            "UPDATE scheduled_jobs
             SET status = 'running', updated_at = NOW()
             WHERE id = (
                 SELECT id FROM scheduled_jobs
                 WHERE status = 'pending' AND due_at <= $1
                 ORDER BY due_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, kind, payment_id, provider, external_ref, checkpoint,
                       due_at, attempts, max_attempts, status, idempotency_key,
                       last_error, created_at, updated_at",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn mark_done(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE scheduled_jobs
             SET status = 'done', updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Put a failed job back in the queue with a new due time.
    pub async fn mark_retry(
        &self,
        id: Uuid,
        due_at: DateTime<Utc>,
        error: &str,
    ) -> Result<JobRecord, DatabaseError> {
        sqlx::query_as::<_, JobRecord>(
            "UPDATE scheduled_jobs
             SET status = 'pending', attempts = attempts + 1, due_at = $2,
                 last_error = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING id, kind, payment_id, provider, external_ref, checkpoint,
                       due_at, attempts, max_attempts, status, idempotency_key,
                       last_error, created_at, updated_at",
        )
        .bind(id)
        .bind(due_at)
        .bind(error)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Dead-letter a job that exhausted its retry budget. The row stays for
    /// operator follow-up.
    pub async fn mark_abandoned(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE scheduled_jobs
             SET status = 'abandoned', attempts = attempts + 1, last_error = $2,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Requeue jobs stuck in `running` past the cutoff (worker crashed or
    /// was killed mid-execution). Delivery is at-least-once; the
    /// reconciliation write path is idempotent, so re-running is safe.
    pub async fn requeue_stale_running(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs
             SET status = 'pending', updated_at = NOW()
             WHERE status = 'running' AND updated_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    pub async fn list_abandoned(&self, limit: i64) -> Result<Vec<JobRecord>, DatabaseError> {
        sqlx::query_as::<_, JobRecord>(
            "SELECT id, kind, payment_id, provider, external_ref, checkpoint,
                    due_at, attempts, max_attempts, status, idempotency_key,
                    last_error, created_at, updated_at
             FROM scheduled_jobs
             WHERE status = 'abandoned'
             ORDER BY updated_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
