//! Row models and DTOs, one module per table.

pub mod license_key;
pub mod mail_job;
pub mod note;
pub mod session;
pub mod status;
pub mod user;
pub mod verification_code;
