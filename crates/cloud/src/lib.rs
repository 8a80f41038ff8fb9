//! Third-party services used by Courier.
//!
//! - [`sheets`] -- read-only client for the contacts spreadsheet.
//! - [`storage`] -- object storage for attachments too large to inline.

pub mod sheets;
pub mod storage;

pub use sheets::{SheetsClient, SheetsConfig, SheetsError};
pub use storage::{AttachmentStore, S3AttachmentStore, S3Config, StorageError};
