//! Route definitions for the `/mail` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::mail;
use crate::state::AppState;

/// Upper bound on a bulk-send request body, attachments included.
const BULK_BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Routes mounted at `/mail`.
///
/// ```text
/// POST /bulk              -> send_bulk (multipart)
/// GET  /jobs              -> list_jobs
/// GET  /jobs/{id}         -> get_job
/// POST /jobs/{id}/cancel  -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/bulk",
            post(mail::send_bulk).layer(DefaultBodyLimit::max(BULK_BODY_LIMIT)),
        )
        .route("/jobs", get(mail::list_jobs))
        .route("/jobs/{id}", get(mail::get_job))
        .route("/jobs/{id}/cancel", post(mail::cancel_job))
}
