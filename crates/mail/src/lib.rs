//! Outbound email for Courier.
//!
//! - [`message`] -- assembling HTML messages with attachments.
//! - [`transport`] -- the [`MailTransport`] seam and its SMTP implementation.
//! - [`system`] -- the server's own mailer (verification codes), configured
//!   from the environment.

pub mod message;
pub mod system;
pub mod transport;

pub use message::{MailAttachment, OutgoingMail};
pub use system::{EmailConfig, SystemMailer};
pub use transport::{MailError, MailTransport, SmtpCredentials, SmtpMailer};
