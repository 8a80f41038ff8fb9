//! The bulk-send side of Courier.
//!
//! [`dispatcher::MailDispatcher`] claims pending jobs from the `mail_jobs`
//! queue and runs each one on its own Tokio task through
//! [`runner::BulkMailRunner`]. The API server embeds the dispatcher by
//! default; the `courier-worker` binary runs it standalone.

pub mod config;
pub mod dispatcher;
pub mod runner;

pub use config::WorkerConfig;
pub use dispatcher::MailDispatcher;
pub use runner::{BulkMailRunner, JobOutcome, SmtpTransportFactory, TransportFactory};
