//! Runs one bulk-send job from start to finish.
//!
//! The runner walks the job's recipients in payload order, sends one message
//! per recipient and writes the counters back after every send, so the
//! polling browser sees progress as it happens. A failed recipient is logged,
//! recorded and skipped. The stop flag comes back from every counter update
//! and is honoured before the next recipient.

use std::sync::Arc;
use std::time::Duration;

use courier_core::bulk_mail::{BulkMailPayload, RecipientFailure};
use courier_core::license::LicenseStatus;
use courier_core::secrets::SecretKey;
use courier_core::types::DbId;
use courier_core::validation::is_valid_email;
use courier_db::models::mail_job::MailJob;
use courier_db::models::user::User;
use courier_db::repositories::{LicenseKeyRepo, MailJobRepo, UserRepo};
use courier_mail::{
    MailAttachment, MailError, MailTransport, OutgoingMail, SmtpCredentials, SmtpMailer,
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Builds a transport for one user's SMTP account.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, credentials: &SmtpCredentials) -> Result<Box<dyn MailTransport>, MailError>;
}

/// Production factory: a fresh `lettre` SMTP transport per job.
pub struct SmtpTransportFactory;

impl TransportFactory for SmtpTransportFactory {
    fn connect(&self, credentials: &SmtpCredentials) -> Result<Box<dyn MailTransport>, MailError> {
        Ok(Box::new(SmtpMailer::new(credentials)?))
    }
}

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { sent: i32, failed: i32 },
    /// The user asked the job to stop.
    Cancelled,
    /// Job-level failure; no further recipients were attempted.
    Failed(String),
    /// The process is shutting down; the job went back to the queue.
    Requeued,
    /// The job was moved to a terminal status elsewhere while this runner
    /// held it. Its status was left untouched.
    Superseded,
}

/// Everything the runner needs before it can send the first message.
struct PreparedJob {
    transport: Box<dyn MailTransport>,
    from_address: String,
    from_name: String,
    payload: BulkMailPayload,
    attachments: Vec<MailAttachment>,
}

/// Executes claimed jobs.
pub struct BulkMailRunner {
    pool: PgPool,
    secret_key: SecretKey,
    transports: Arc<dyn TransportFactory>,
    send_delay: Duration,
}

impl BulkMailRunner {
    pub fn new(
        pool: PgPool,
        secret_key: SecretKey,
        transports: Arc<dyn TransportFactory>,
        send_delay: Duration,
    ) -> Self {
        Self {
            pool,
            secret_key,
            transports,
            send_delay,
        }
    }

    /// Run a claimed job to a terminal state (or back to the queue when
    /// `shutdown` fires). Only database errors escape.
    pub async fn run(
        &self,
        job: MailJob,
        shutdown: &CancellationToken,
    ) -> Result<JobOutcome, sqlx::Error> {
        if job.stop_requested {
            MailJobRepo::mark_cancelled(&self.pool, job.id).await?;
            tracing::info!(job_id = job.id, "Mail job cancelled before sending");
            return Ok(JobOutcome::Cancelled);
        }

        let prepared = match self.prepare(&job).await? {
            Ok(prepared) => prepared,
            Err(reason) => {
                tracing::warn!(job_id = job.id, user_id = job.user_id, error = %reason, "Mail job failed");
                MailJobRepo::fail(&self.pool, job.id, &reason).await?;
                return Ok(JobOutcome::Failed(reason));
            }
        };

        // Counters survive a requeue; skip recipients already handled.
        let already_processed = job.progress().processed().max(0) as usize;
        let mut sent = job.sent_count;
        let mut failed = job.failed_count;

        tracing::info!(
            job_id = job.id,
            user_id = job.user_id,
            recipients = prepared.payload.recipients.len(),
            resume_from = already_processed,
            "Mail job started",
        );

        for (index, recipient) in prepared
            .payload
            .recipients
            .iter()
            .enumerate()
            .skip(already_processed)
        {
            if shutdown.is_cancelled() {
                MailJobRepo::requeue(&self.pool, job.id).await?;
                tracing::info!(job_id = job.id, processed = index, "Mail job requeued for shutdown");
                return Ok(JobOutcome::Requeued);
            }
            if index > already_processed && !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }

            let mail = OutgoingMail {
                from_address: prepared.from_address.clone(),
                from_name: Some(prepared.from_name.clone()),
                to: recipient.clone(),
                subject: prepared.payload.subject.clone(),
                html_body: prepared.payload.html_body.clone(),
                attachments: prepared.attachments.clone(),
            };

            let stop_requested = match prepared.transport.send(&mail).await {
                Ok(()) => {
                    sent += 1;
                    MailJobRepo::record_sent(&self.pool, job.id).await?
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(job_id = job.id, recipient = %recipient, error = %e, "Recipient failed");
                    let failure = RecipientFailure {
                        email: recipient.clone(),
                        error: e.to_string(),
                    };
                    MailJobRepo::record_failure(&self.pool, job.id, &failure).await?
                }
            };

            if stop_requested {
                if !MailJobRepo::mark_cancelled(&self.pool, job.id).await? {
                    return Ok(superseded(job.id));
                }
                tracing::info!(job_id = job.id, sent, failed, "Mail job stopped by user");
                return Ok(JobOutcome::Cancelled);
            }
        }

        if !MailJobRepo::complete(&self.pool, job.id).await? {
            return Ok(superseded(job.id));
        }
        tracing::info!(job_id = job.id, sent, failed, "Mail job completed");
        Ok(JobOutcome::Completed { sent, failed })
    }

    /// Load the sender and decode the payload. The inner `Err` is a
    /// job-level failure message.
    async fn prepare(&self, job: &MailJob) -> Result<Result<PreparedJob, String>, sqlx::Error> {
        let Some(user) = UserRepo::find_by_id(&self.pool, job.user_id).await? else {
            return Ok(Err("Sender account no longer exists".to_string()));
        };
        let license = LicenseKeyRepo::find_by_id(&self.pool, user.license_key_id).await?;
        match license.map(|k| k.status()) {
            Some(LicenseStatus::Active) => {}
            Some(status) => {
                return Ok(Err(format!("Sender's license key is {}", status.as_str())));
            }
            None => return Ok(Err("Sender's license key no longer exists".to_string())),
        }
        Ok(self.prepare_for(&user, job))
    }

    fn prepare_for(&self, user: &User, job: &MailJob) -> Result<PreparedJob, String> {
        let credentials = smtp_credentials(user, &self.secret_key)?;

        let payload = BulkMailPayload::from_json(&job.payload).map_err(|e| e.to_string())?;
        let attachments = payload
            .attachments
            .iter()
            .map(MailAttachment::from_encoded)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;

        let transport = self
            .transports
            .connect(&credentials)
            .map_err(|e| format!("Could not set up SMTP transport: {e}"))?;

        Ok(PreparedJob {
            transport,
            from_address: sender_address(user),
            from_name: user.full_name.clone(),
            payload,
            attachments,
        })
    }
}

fn superseded(job_id: DbId) -> JobOutcome {
    tracing::warn!(job_id, "Mail job was finished by another process; leaving it as is");
    JobOutcome::Superseded
}

/// Decrypt a user's stored SMTP settings.
pub fn smtp_credentials(user: &User, key: &SecretKey) -> Result<SmtpCredentials, String> {
    let (Some(host), Some(port), Some(username), Some(sealed)) = (
        user.smtp_host.as_ref(),
        user.smtp_port,
        user.smtp_username.as_ref(),
        user.smtp_password_encrypted.as_ref(),
    ) else {
        return Err("SMTP settings are not configured".to_string());
    };

    let password = key
        .open(sealed)
        .map_err(|_| "Stored SMTP password could not be decrypted".to_string())?;
    let port = u16::try_from(port).map_err(|_| format!("Invalid SMTP port {port}"))?;

    Ok(SmtpCredentials {
        host: host.clone(),
        port,
        username: username.clone(),
        password,
    })
}

/// The SMTP login when it is an address, else the account email.
pub fn sender_address(user: &User) -> String {
    match user.smtp_username.as_deref() {
        Some(username) if is_valid_email(username) => username.to_string(),
        _ => user.email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(key: &SecretKey) -> User {
        let now = Utc::now();
        User {
            id: 1,
            email: "owner@example.com".into(),
            full_name: "Owner".into(),
            password_hash: String::new(),
            role: "user".into(),
            license_key_id: 1,
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: Some(587),
            smtp_username: Some("sales@example.com".into()),
            smtp_password_encrypted: Some(key.seal("app-secret").unwrap()),
            app_password_hash: None,
            is_active: true,
            failed_login_count: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn credentials_are_decrypted() {
        let key = SecretKey::from_bytes([3u8; 32]);
        let creds = smtp_credentials(&user(&key), &key).unwrap();
        assert_eq!(creds.host, "smtp.example.com");
        assert_eq!(creds.port, 587);
        assert_eq!(creds.password, "app-secret");
    }

    #[test]
    fn missing_smtp_settings_fail() {
        let key = SecretKey::from_bytes([3u8; 32]);
        let mut u = user(&key);
        u.smtp_host = None;
        assert_eq!(
            smtp_credentials(&u, &key).unwrap_err(),
            "SMTP settings are not configured"
        );
    }

    #[test]
    fn wrong_key_cannot_decrypt() {
        let key = SecretKey::from_bytes([3u8; 32]);
        let other = SecretKey::from_bytes([4u8; 32]);
        assert!(smtp_credentials(&user(&key), &other)
            .unwrap_err()
            .contains("could not be decrypted"));
    }

    #[test]
    fn sender_prefers_smtp_login_address() {
        let key = SecretKey::from_bytes([3u8; 32]);
        let mut u = user(&key);
        assert_eq!(sender_address(&u), "sales@example.com");
        u.smtp_username = Some("apikey".into());
        assert_eq!(sender_address(&u), "owner@example.com");
    }
}
