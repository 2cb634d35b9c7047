//! Worker pool draining the delayed-job queue.
//!
//! Each runner polls for due jobs, claims them one at a time with
//! `SKIP LOCKED`, and hands them to the reconciliation service. Failed jobs
//! retry with exponential backoff until the attempt budget runs out, then
//! land in the abandoned state with an error-level log for operator
//! follow-up.

use crate::config::SchedulerConfig;
use crate::database::job_repository::{JobRecord, JobRepository};
use crate::scheduler::backoff_delay;
use crate::services::reconciliation::ReconciliationService;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Jobs stuck in `running` longer than this are assumed orphaned by a dead
/// worker and put back in the queue.
const STALE_RUNNING_SECS: i64 = 600;

pub struct JobRunner {
    worker_id: usize,
    repo: JobRepository,
    reconciliation: Arc<ReconciliationService>,
    config: SchedulerConfig,
}

impl JobRunner {
    pub fn new(
        worker_id: usize,
        pool: PgPool,
        reconciliation: Arc<ReconciliationService>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            worker_id,
            repo: JobRepository::new(pool),
            reconciliation,
            config,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            worker_id = self.worker_id,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_attempts = self.config.max_attempts,
            "job runner started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(worker_id = self.worker_id, "job runner stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.run_cycle().await;
                }
            }
        }

        info!(worker_id = self.worker_id, "job runner stopped");
    }

    async fn run_cycle(&self) {
        // Worker 0 doubles as the janitor for orphaned claims.
        if self.worker_id == 0 {
            let cutoff = Utc::now() - ChronoDuration::seconds(STALE_RUNNING_SECS);
            match self.repo.requeue_stale_running(cutoff).await {
                Ok(0) => {}
                Ok(n) => warn!(requeued = n, "requeued jobs orphaned by a dead worker"),
                Err(e) => warn!(error = %e, "failed to requeue stale jobs"),
            }
        }

        // Drain everything currently due, then go back to sleep.
        loop {
            let job = match self.repo.claim_due(Utc::now()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    warn!(worker_id = self.worker_id, error = %e, "failed to claim job");
                    break;
                }
            };

            self.execute(job).await;
        }
    }

    async fn execute(&self, job: JobRecord) {
        match self.reconciliation.run_job(&job).await {
            Ok(state) => {
                info!(
                    job_id = %job.id,
                    kind = %job.kind,
                    checkpoint = %job.checkpoint,
                    payment_id = %job.payment_id,
                    state = %state,
                    "job completed"
                );
                if let Err(e) = self.repo.mark_done(job.id).await {
                    warn!(job_id = %job.id, error = %e, "failed to mark job done");
                }
            }
            Err(e) => {
                let next_attempt = job.attempts + 1;
                if next_attempt >= job.max_attempts {
                    error!(
                        job_id = %job.id,
                        kind = %job.kind,
                        payment_id = %job.payment_id,
                        provider = %job.provider,
                        attempts = next_attempt,
                        error = %e,
                        "job abandoned after exhausting retries"
                    );
                    if let Err(mark_err) = self.repo.mark_abandoned(job.id, &e.to_string()).await {
                        error!(job_id = %job.id, error = %mark_err, "failed to mark job abandoned");
                    }
                } else {
                    let delay = backoff_delay(self.config.retry_backoff_base, job.attempts);
                    let due_at =
                        Utc::now() + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::zero());
                    warn!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempt = next_attempt,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "job failed, scheduling retry"
                    );
                    if let Err(mark_err) = self.repo.mark_retry(job.id, due_at, &e.to_string()).await
                    {
                        error!(job_id = %job.id, error = %mark_err, "failed to schedule retry");
                    }
                }
            }
        }
    }
}

/// Spawn the configured number of runners sharing one shutdown channel.
pub fn spawn_runners(
    pool: PgPool,
    reconciliation: Arc<ReconciliationService>,
    config: SchedulerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..config.worker_count)
        .map(|worker_id| {
            let runner = JobRunner::new(
                worker_id,
                pool.clone(),
                reconciliation.clone(),
                config.clone(),
            );
            tokio::spawn(runner.run(shutdown_rx.clone()))
        })
        .collect()
}
