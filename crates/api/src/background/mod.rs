//! Background tasks owned by the API process.
//!
//! Long-running tasks are spawned via `tokio::spawn` and accept a
//! [`CancellationToken`] for graceful shutdown. [`bootstrap`] holds the
//! one-off seeding done before the server starts listening.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod bootstrap;
pub mod housekeeping;
