//! The server's own mailer, used for verification codes.
//!
//! Configuration is loaded from environment variables; if `SMTP_HOST` is not
//! set, [`EmailConfig::from_env`] returns `None` and callers fall back to
//! logging the message instead of sending it.

use crate::message::OutgoingMail;
use crate::transport::{MailError, MailTransport, SmtpCredentials, SmtpMailer};

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@courier.local";

/// Sender display name on system messages.
const SYSTEM_SENDER_NAME: &str = "Courier";

/// Configuration for the system mailer.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    /// Defaults to 587.
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable        | Required | Default                  |
    /// |-----------------|----------|--------------------------|
    /// | `SMTP_HOST`     | yes      |                          |
    /// | `SMTP_PORT`     | no       | `587`                    |
    /// | `SMTP_FROM`     | no       | `noreply@courier.local`  |
    /// | `SMTP_USER`     | no       |                          |
    /// | `SMTP_PASSWORD` | no       |                          |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

/// Sends account notices (verification codes) from the server's address.
pub struct SystemMailer {
    from_address: String,
    transport: Box<dyn MailTransport>,
}

impl SystemMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let credentials = SmtpCredentials {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            username: config.smtp_user.clone().unwrap_or_default(),
            password: config.smtp_password.clone().unwrap_or_default(),
        };
        Ok(Self::with_transport(
            config.from_address.clone(),
            Box::new(SmtpMailer::new(&credentials)?),
        ))
    }

    pub fn with_transport(from_address: String, transport: Box<dyn MailTransport>) -> Self {
        Self {
            from_address,
            transport,
        }
    }

    /// Email a password-reset code.
    pub async fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), MailError> {
        let mail = OutgoingMail {
            from_address: self.from_address.clone(),
            from_name: Some(SYSTEM_SENDER_NAME.to_string()),
            to: to.to_string(),
            subject: "Your Courier verification code".to_string(),
            html_body: verification_body(code, ttl_minutes),
            attachments: Vec::new(),
        };
        self.transport.send(&mail).await?;
        tracing::info!(to, "Verification code email sent");
        Ok(())
    }
}

fn verification_body(code: &str, ttl_minutes: i64) -> String {
    format!(
        "<p>Your verification code is <strong>{code}</strong>.</p>\
         <p>It expires in {ttl_minutes} minutes. If you did not request it, ignore this email.</p>"
    )
}
