//! Repository for the `mail_jobs` table: the bulk-send queue and its
//! progress store.
//!
//! Uses `MailJobStatus` from `models::status` for every status transition.

use std::time::Duration;

use courier_core::bulk_mail::{RecipientFailure, MAX_RECORDED_FAILURES};
use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::mail_job::{EnqueueMailJob, MailJob, MailJobSummary};
use crate::models::status::MailJobStatus;

/// Full column list, payload included.
const COLUMNS: &str = "\
    id, user_id, status_id, subject, payload, total_recipients, \
    sent_count, failed_count, failures, stop_requested, error_message, \
    submitted_at, claimed_at, started_at, completed_at, created_at, updated_at";

/// Column list for [`MailJobSummary`] (no payload).
const SUMMARY_COLUMNS: &str = "\
    id, user_id, status_id, subject, total_recipients, \
    sent_count, failed_count, failures, stop_requested, error_message, \
    submitted_at, started_at, completed_at";

/// Provides queue and progress operations for bulk mail jobs.
pub struct MailJobRepo;

impl MailJobRepo {
    /// Insert a pending job. Returns immediately with the summary row.
    pub async fn enqueue(
        pool: &PgPool,
        input: &EnqueueMailJob,
    ) -> Result<MailJobSummary, sqlx::Error> {
        let query = format!(
            "INSERT INTO mail_jobs (user_id, status_id, subject, payload, total_recipients)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SUMMARY_COLUMNS}"
        );
        sqlx::query_as::<_, MailJobSummary>(&query)
            .bind(input.user_id)
            .bind(MailJobStatus::Pending.id())
            .bind(&input.subject)
            .bind(&input.payload)
            .bind(input.total_recipients)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest pending job and mark it running.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so several dispatchers can share
    /// the queue without double-dispatch.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<MailJob>, sqlx::Error> {
        let query = format!(
            "UPDATE mail_jobs
             SET status_id = $1, claimed_at = NOW(), started_at = COALESCE(started_at, NOW())
             WHERE id = (
                 SELECT id FROM mail_jobs
                 WHERE status_id = $2
                 ORDER BY submitted_at ASC, id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MailJob>(&query)
            .bind(MailJobStatus::Running.id())
            .bind(MailJobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Find a job (with payload) by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MailJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM mail_jobs WHERE id = $1");
        sqlx::query_as::<_, MailJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find one of a user's jobs without its payload.
    pub async fn find_summary_for_user(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<MailJobSummary>, sqlx::Error> {
        let query =
            format!("SELECT {SUMMARY_COLUMNS} FROM mail_jobs WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, MailJobSummary>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's jobs, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailJobSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM mail_jobs
             WHERE user_id = $1
             ORDER BY submitted_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, MailJobSummary>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count one delivered recipient. Returns whether the runner should stop:
    /// the user asked for it, or the job is no longer running.
    pub async fn record_sent(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE mail_jobs SET sent_count = sent_count + 1
             WHERE id = $1
             RETURNING stop_requested OR status_id <> $2",
        )
        .bind(job_id)
        .bind(MailJobStatus::Running.id())
        .fetch_one(pool)
        .await
    }

    /// Count one failed recipient and record it (up to
    /// [`MAX_RECORDED_FAILURES`] entries). Returns whether the runner should
    /// stop, as for [`record_sent`](Self::record_sent).
    pub async fn record_failure(
        pool: &PgPool,
        job_id: DbId,
        failure: &RecipientFailure,
    ) -> Result<bool, sqlx::Error> {
        let entry = serde_json::json!([failure]);
        sqlx::query_scalar(
            "UPDATE mail_jobs SET
                failed_count = failed_count + 1,
                failures = CASE
                    WHEN jsonb_array_length(failures) < $3 THEN failures || $2
                    ELSE failures
                END
             WHERE id = $1
             RETURNING stop_requested OR status_id <> $4",
        )
        .bind(job_id)
        .bind(entry)
        .bind(MAX_RECORDED_FAILURES as i32)
        .bind(MailJobStatus::Running.id())
        .fetch_one(pool)
        .await
    }

    /// Mark a running job completed. Returns `false` if the job was no longer
    /// running (failed or cancelled by someone else) and was left as is.
    pub async fn complete(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, MailJobStatus::Completed, None).await
    }

    /// Mark a running job failed with a job-level error (per-recipient
    /// failures do not fail the job).
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, MailJobStatus::Failed, Some(error)).await
    }

    /// Mark a running job cancelled after its stop flag was observed.
    pub async fn mark_cancelled(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, MailJobStatus::Cancelled, None).await
    }

    /// Move a running job to a terminal status. Terminal rows never change.
    async fn finish(
        pool: &PgPool,
        job_id: DbId,
        status: MailJobStatus,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE mail_jobs
             SET status_id = $2, error_message = COALESCE($3, error_message), completed_at = NOW()
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(status.id())
        .bind(error)
        .bind(MailJobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ask a job to stop.
    ///
    /// A pending job is cancelled outright; a running job gets its stop flag
    /// set and the runner cancels it between recipients. Returns `false` if
    /// the job is not the user's or is already terminal.
    pub async fn request_stop(
        pool: &PgPool,
        user_id: DbId,
        job_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE mail_jobs SET
                stop_requested = true,
                status_id = CASE WHEN status_id = $3 THEN $5 ELSE status_id END,
                completed_at = CASE WHEN status_id = $3 THEN NOW() ELSE completed_at END
             WHERE id = $1 AND user_id = $2 AND status_id IN ($3, $4)",
        )
        .bind(job_id)
        .bind(user_id)
        .bind(MailJobStatus::Pending.id())
        .bind(MailJobStatus::Running.id())
        .bind(MailJobStatus::Cancelled.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return a running job to the queue, keeping its counters. The next
    /// claim resumes after the recipients already processed.
    pub async fn requeue(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE mail_jobs
             SET status_id = $2, claimed_at = NULL
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(MailJobStatus::Pending.id())
        .bind(MailJobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail running jobs that have not been touched for `stale_after`.
    ///
    /// A live runner updates its row after every recipient, so only jobs
    /// abandoned by a process that died mid-send go quiet for that long.
    /// Jobs owned by other live dispatchers are left alone.
    pub async fn fail_interrupted(
        pool: &PgPool,
        stale_after: Duration,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE mail_jobs
             SET status_id = $1, error_message = 'Worker stopped unexpectedly while sending', completed_at = NOW()
             WHERE status_id = $2 AND updated_at <= NOW() - make_interval(secs => $3)",
        )
        .bind(MailJobStatus::Failed.id())
        .bind(MailJobStatus::Running.id())
        .bind(stale_after.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
