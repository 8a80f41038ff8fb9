//! Domain types and pure logic for the Courier mailing panel.
//!
//! Nothing in this crate touches the network or the database; the `db`,
//! `mail`, `cloud`, `worker`, and `api` crates build on it.

pub mod bulk_mail;
pub mod contacts;
pub mod error;
pub mod hashing;
pub mod license;
pub mod notes;
pub mod pagination;
pub mod roles;
pub mod secrets;
pub mod types;
pub mod validation;
pub mod verification;
