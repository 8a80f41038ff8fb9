pub mod admin;
pub mod auth;
pub mod contacts;
pub mod health;
pub mod mail;
pub mod notes;
pub mod settings;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                       register (public)
/// /auth/login                          login (public)
/// /auth/refresh                        refresh (public)
/// /auth/logout                         logout (requires auth)
/// /auth/verification-code              issue password-reset code (public)
/// /auth/password-reset                 reset password with code (public)
///
/// /settings                            profile, SMTP and license overview
/// /settings/profile                    update full name (PUT)
/// /settings/smtp                       update SMTP account (PUT)
/// /settings/smtp/test                  send a test message (POST)
/// /settings/app-password               set bulk-send password (PUT)
/// /settings/password                   change login password (PUT)
///
/// /notes                               list, create
/// /notes/{id}                          get, update, delete
///
/// /contacts                            filtered contact list
/// /contacts/groups                     segment and possibility counts
///
/// /mail/bulk                           queue a bulk send (multipart POST)
/// /mail/jobs                           list jobs
/// /mail/jobs/{id}                      job progress (polled)
/// /mail/jobs/{id}/cancel               request stop (POST)
///
/// /admin/license-keys                  list, issue (admin only)
/// /admin/license-keys/{id}/revoke      revoke (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/settings", settings::router())
        .nest("/notes", notes::router())
        .nest("/contacts", contacts::router())
        .nest("/mail", mail::router())
        .nest("/admin", admin::router())
}
