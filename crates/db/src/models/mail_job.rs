//! Bulk mail job models (the task queue and its status store).

use courier_core::bulk_mail::{JobProgress, RecipientFailure};
use courier_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{MailJobStatus, StatusId};

/// A row from the `mail_jobs` table.
///
/// `payload` carries base64 attachments and can be large; list queries use
/// [`MailJobSummary`] instead.
#[derive(Debug, Clone, FromRow)]
pub struct MailJob {
    pub id: DbId,
    pub user_id: DbId,
    pub status_id: StatusId,
    pub subject: String,
    pub payload: serde_json::Value,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub failures: serde_json::Value,
    pub stop_requested: bool,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MailJob {
    pub fn progress(&self) -> JobProgress {
        JobProgress::new(self.total_recipients, self.sent_count, self.failed_count)
    }
}

/// A job row without its payload.
#[derive(Debug, Clone, FromRow)]
pub struct MailJobSummary {
    pub id: DbId,
    pub user_id: DbId,
    pub status_id: StatusId,
    pub subject: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub failures: serde_json::Value,
    pub stop_requested: bool,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// Progress view returned to the polling browser.
#[derive(Debug, Clone, Serialize)]
pub struct MailJobProgressResponse {
    pub id: DbId,
    pub status: &'static str,
    pub subject: String,
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
    pub percent: i16,
    pub stop_requested: bool,
    pub error_message: Option<String>,
    pub failures: Vec<RecipientFailure>,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl From<MailJobSummary> for MailJobProgressResponse {
    fn from(job: MailJobSummary) -> Self {
        let progress = JobProgress::new(job.total_recipients, job.sent_count, job.failed_count);
        let status = MailJobStatus::from_id(job.status_id)
            .map(MailJobStatus::name)
            .unwrap_or("unknown");
        let failures = serde_json::from_value(job.failures).unwrap_or_default();
        Self {
            id: job.id,
            status,
            subject: job.subject,
            total: progress.total,
            sent: progress.sent,
            failed: progress.failed,
            percent: progress.percent(),
            stop_requested: job.stop_requested,
            error_message: job.error_message,
            failures,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// DTO for enqueueing a job.
pub struct EnqueueMailJob {
    pub user_id: DbId,
    pub subject: String,
    pub payload: serde_json::Value,
    pub total_recipients: i32,
}
