use std::sync::Arc;

use courier_cloud::{AttachmentStore, SheetsClient};
use courier_mail::SystemMailer;
use courier_worker::TransportFactory;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
/// Optional integrations are `None` when their environment is not configured.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: courier_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Sends verification codes from the server's own address.
    pub system_mailer: Option<Arc<SystemMailer>>,
    /// Contact spreadsheet.
    pub sheets: Option<Arc<SheetsClient>>,
    /// Hosting for attachments over the inline limit.
    pub attachment_store: Option<Arc<dyn AttachmentStore>>,
    /// Builds SMTP transports from user settings (used by the SMTP test).
    pub transports: Arc<dyn TransportFactory>,
}
