//! Bulk mail job dispatcher.
//!
//! Polls the queue every `poll_interval` and starts one task per claimed job,
//! up to `max_concurrent_jobs` at a time. Uses `SELECT FOR UPDATE SKIP LOCKED`
//! via [`MailJobRepo::claim_next`] to prevent double-dispatch.

use std::sync::Arc;
use std::time::Duration;

use courier_db::repositories::MailJobRepo;
use sqlx::PgPool;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::runner::{BulkMailRunner, TransportFactory};

/// Background job dispatcher.
pub struct MailDispatcher {
    pool: PgPool,
    runner: Arc<BulkMailRunner>,
    poll_interval: Duration,
    max_concurrent_jobs: usize,
    stale_job_after: Duration,
}

impl MailDispatcher {
    pub fn new(pool: PgPool, config: &WorkerConfig, transports: Arc<dyn TransportFactory>) -> Self {
        let runner = BulkMailRunner::new(
            pool.clone(),
            config.smtp_secret_key.clone(),
            transports,
            config.send_delay,
        );
        Self {
            pool,
            runner: Arc::new(runner),
            poll_interval: config.poll_interval,
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
            stale_job_after: config.stale_job_after,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    ///
    /// On shutdown, in-flight jobs return to the queue at their next
    /// recipient boundary and the loop waits for them before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        match MailJobRepo::fail_interrupted(&self.pool, self.stale_job_after).await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "Failed mail jobs left running by a previous process"),
            Err(e) => tracing::error!(error = %e, "Could not recover interrupted mail jobs"),
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut tasks: JoinSet<()> = JoinSet::new();
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_concurrent_jobs = self.max_concurrent_jobs,
            "Mail dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = tasks.len(), "Mail dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    reap(&mut tasks);
                    if let Err(e) = self.try_dispatch(&mut tasks, &cancel).await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            log_join_error(result);
        }
    }

    /// One dispatch cycle: claim jobs until the queue is empty or the
    /// concurrency cap is reached.
    async fn try_dispatch(
        &self,
        tasks: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> Result<(), sqlx::Error> {
        while tasks.len() < self.max_concurrent_jobs {
            let Some(job) = MailJobRepo::claim_next(&self.pool).await? else {
                break;
            };
            let job_id = job.id;
            tracing::info!(job_id, user_id = job.user_id, "Mail job claimed");

            let runner = Arc::clone(&self.runner);
            let pool = self.pool.clone();
            let shutdown = cancel.clone();
            tasks.spawn(async move {
                if let Err(e) = runner.run(job, &shutdown).await {
                    tracing::error!(job_id, error = %e, "Mail job aborted on database error");
                    if let Err(e) = MailJobRepo::fail(&pool, job_id, "Internal error while sending").await {
                        tracing::error!(job_id, error = %e, "Could not mark mail job failed");
                    }
                }
            });
        }
        Ok(())
    }
}

fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        log_join_error(result);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Mail job task panicked");
    }
}
