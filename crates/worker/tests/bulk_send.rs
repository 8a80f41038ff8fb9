//! Runner behaviour against a real database with a recording transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use courier_core::bulk_mail::{encode_attachment, BulkMailPayload};
use courier_core::secrets::SecretKey;
use courier_db::models::license_key::CreateLicenseKey;
use courier_db::models::mail_job::{EnqueueMailJob, MailJobProgressResponse};
use courier_db::models::status::MailJobStatus;
use courier_db::models::user::{CreateUser, UpdateSmtpSettings, User};
use courier_db::repositories::{LicenseKeyRepo, MailJobRepo, UserRepo};
use courier_mail::{MailError, MailTransport, OutgoingMail, SmtpCredentials};
use courier_worker::{BulkMailRunner, JobOutcome, TransportFactory};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

const KEY: [u8; 32] = [9u8; 32];

#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    /// Cancelled after the first successful send.
    cancel_after_first: Option<CancellationToken>,
}

#[async_trait]
impl MailTransport for Recorder {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if mail.to.contains("bounce") {
            return Err(MailError::Build("mailbox unavailable".into()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        Ok(())
    }
}

struct RecorderFactory(Recorder);

impl TransportFactory for RecorderFactory {
    fn connect(&self, _: &SmtpCredentials) -> Result<Box<dyn MailTransport>, MailError> {
        Ok(Box::new(self.0.clone()))
    }
}

fn runner(pool: &PgPool, recorder: Recorder) -> BulkMailRunner {
    BulkMailRunner::new(
        pool.clone(),
        SecretKey::from_bytes(KEY),
        Arc::new(RecorderFactory(recorder)),
        Duration::ZERO,
    )
}

async fn create_user(pool: &PgPool, with_smtp: bool) -> User {
    let license = LicenseKeyRepo::create(
        pool,
        "AAAAA-BBBBB-CCCCC-DDDDD",
        &CreateLicenseKey {
            label: "test".into(),
            expires_at: None,
        },
    )
    .await
    .unwrap();
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: "owner@example.com".into(),
            full_name: "Owner".into(),
            password_hash: "x".into(),
            role: "user".into(),
            license_key_id: license.id,
        },
    )
    .await
    .unwrap();
    if !with_smtp {
        return user;
    }
    let sealed = SecretKey::from_bytes(KEY).seal("smtp-pass").unwrap();
    UserRepo::update_smtp_settings(
        pool,
        user.id,
        &UpdateSmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            username: "sales@example.com".into(),
            password_encrypted: Some(sealed),
        },
    )
    .await
    .unwrap()
    .unwrap()
}

async fn enqueue(pool: &PgPool, user_id: i64, recipients: &[&str]) -> i64 {
    let payload = BulkMailPayload {
        subject: "Spring catalogue".into(),
        html_body: "<p>Hello</p>".into(),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        attachments: vec![encode_attachment("prices.csv", "text/csv", b"sku,price\n1,10\n")],
        hosted_attachments: vec![],
    };
    MailJobRepo::enqueue(
        pool,
        &EnqueueMailJob {
            user_id,
            subject: payload.subject.clone(),
            payload: payload.to_json(),
            total_recipients: recipients.len() as i32,
        },
    )
    .await
    .unwrap()
    .id
}

async fn progress(pool: &PgPool, user_id: i64, job_id: i64) -> MailJobProgressResponse {
    MailJobRepo::find_summary_for_user(pool, user_id, job_id)
        .await
        .unwrap()
        .unwrap()
        .into()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failing_recipients_are_recorded_and_skipped(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com", "bounce@example.com", "c@example.com"]).await;

    let recorder = Recorder::default();
    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    let outcome = runner(&pool, recorder.clone())
        .run(job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Completed { sent: 2, failed: 1 });
    let p = progress(&pool, user.id, job_id).await;
    assert_eq!(p.status, MailJobStatus::Completed.name());
    assert_eq!((p.total, p.sent, p.failed, p.percent), (3, 2, 1, 100));
    assert_eq!(p.failures.len(), 1);
    assert_eq!(p.failures[0].email, "bounce@example.com");

    let sent = recorder.sent.lock().unwrap();
    assert_eq!(sent[0].from_address, "sales@example.com");
    assert_eq!(sent[0].attachments[0].bytes, b"sku,price\n1,10\n");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_smtp_settings_fail_the_job(pool: PgPool) {
    let user = create_user(&pool, false).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com"]).await;

    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    let outcome = runner(&pool, Recorder::default())
        .run(job, &CancellationToken::new())
        .await
        .unwrap();

    assert_matches!(outcome, JobOutcome::Failed(ref msg) if msg.contains("SMTP settings"));
    let p = progress(&pool, user.id, job_id).await;
    assert_eq!(p.status, MailJobStatus::Failed.name());
    assert_eq!(p.sent, 0);
    assert!(p.error_message.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn revoked_license_fails_queued_job(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com", "b@example.com"]).await;
    LicenseKeyRepo::revoke(&pool, user.license_key_id).await.unwrap().unwrap();

    let recorder = Recorder::default();
    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    let outcome = runner(&pool, recorder.clone())
        .run(job, &CancellationToken::new())
        .await
        .unwrap();

    assert_matches!(outcome, JobOutcome::Failed(ref msg) if msg.contains("revoked"));
    assert!(recorder.sent.lock().unwrap().is_empty());
    let p = progress(&pool, user.id, job_id).await;
    assert_eq!(p.status, MailJobStatus::Failed.name());
    assert_eq!(p.sent, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stop_flag_cancels_between_recipients(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com", "b@example.com", "c@example.com"]).await;

    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert!(MailJobRepo::request_stop(&pool, user.id, job_id).await.unwrap());

    let recorder = Recorder::default();
    let outcome = runner(&pool, recorder.clone())
        .run(job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    let p = progress(&pool, user.id, job_id).await;
    assert_eq!(p.status, MailJobStatus::Cancelled.name());
    assert_eq!(p.sent, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn shutdown_requeues_and_resume_skips_sent_recipients(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com", "b@example.com", "c@example.com"]).await;

    let shutdown = CancellationToken::new();
    let first = Recorder {
        cancel_after_first: Some(shutdown.clone()),
        ..Default::default()
    };
    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    let outcome = runner(&pool, first.clone()).run(job, &shutdown).await.unwrap();
    assert_eq!(outcome, JobOutcome::Requeued);
    assert_eq!(progress(&pool, user.id, job_id).await.status, MailJobStatus::Pending.name());

    let second = Recorder::default();
    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    let outcome = runner(&pool, second.clone())
        .run(job, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, JobOutcome::Completed { sent: 3, failed: 0 });

    let resumed: Vec<String> = second.sent.lock().unwrap().iter().map(|m| m.to.clone()).collect();
    assert_eq!(resumed, vec!["b@example.com", "c@example.com"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fail_interrupted_fails_quiet_running_jobs(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com"]).await;
    MailJobRepo::claim_next(&pool).await.unwrap().unwrap();

    assert_eq!(MailJobRepo::fail_interrupted(&pool, Duration::ZERO).await.unwrap(), 1);
    let p = progress(&pool, user.id, job_id).await;
    assert_eq!(p.status, MailJobStatus::Failed.name());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fail_interrupted_leaves_recently_active_jobs(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com"]).await;
    MailJobRepo::claim_next(&pool).await.unwrap().unwrap();

    let stale_after = Duration::from_secs(900);
    assert_eq!(MailJobRepo::fail_interrupted(&pool, stale_after).await.unwrap(), 0);
    assert_eq!(progress(&pool, user.id, job_id).await.status, MailJobStatus::Running.name());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn runner_does_not_overwrite_a_job_failed_elsewhere(pool: PgPool) {
    let user = create_user(&pool, true).await;
    let job_id = enqueue(&pool, user.id, &["a@example.com", "b@example.com", "c@example.com"]).await;

    let job = MailJobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert!(MailJobRepo::fail(&pool, job_id, "Worker stopped unexpectedly while sending").await.unwrap());

    let recorder = Recorder::default();
    let outcome = runner(&pool, recorder.clone())
        .run(job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Superseded);
    assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    let p = progress(&pool, user.id, job_id).await;
    assert_eq!(p.status, MailJobStatus::Failed.name());
    assert_eq!(p.error_message.as_deref(), Some("Worker stopped unexpectedly while sending"));
}
