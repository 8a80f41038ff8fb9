//! SMTP delivery behind the [`MailTransport`] seam.
//!
//! The bulk-send worker talks to a `dyn MailTransport` so tests can swap in
//! a recording fake. [`SmtpMailer`] is the production implementation built
//! from one user's SMTP settings.

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::message::OutgoingMail;

/// Port on which SMTP servers expect implicit TLS instead of STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Per-connection timeout for SMTP commands.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, rejection).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

/// Sends one fully-formed message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// SMTP server and login used for a send.
#[derive(Clone)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Async SMTP transport for one account.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a transport for the given server.
    ///
    /// Port 465 uses implicit TLS; every other port negotiates STARTTLS.
    pub fn new(credentials: &SmtpCredentials) -> Result<Self, MailError> {
        let builder = if credentials.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&credentials.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&credentials.host)?
        };

        let transport = builder
            .port(credentials.port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = mail.to_message()?;
        self.transport.send(message).await?;
        tracing::debug!(to = %mail.to, subject = %mail.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(port: u16) -> SmtpCredentials {
        SmtpCredentials {
            host: "smtp.example.com".into(),
            port,
            username: "sales@example.com".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", creds(587));
        assert!(rendered.contains("smtp.example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn builds_starttls_and_implicit_tls_transports() {
        assert!(SmtpMailer::new(&creds(587)).is_ok());
        assert!(SmtpMailer::new(&creds(IMPLICIT_TLS_PORT)).is_ok());
    }

    #[test]
    fn mail_error_display_build() {
        let err = MailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
