//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod license_key_repo;
pub mod mail_job_repo;
pub mod note_repo;
pub mod session_repo;
pub mod user_repo;
pub mod verification_code_repo;

pub use license_key_repo::LicenseKeyRepo;
pub use mail_job_repo::MailJobRepo;
pub use note_repo::NoteRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
pub use verification_code_repo::VerificationCodeRepo;
