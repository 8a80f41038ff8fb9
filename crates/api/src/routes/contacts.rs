//! Route definitions for the `/contacts` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::contacts;
use crate::state::AppState;

/// Routes mounted at `/contacts`.
///
/// ```text
/// GET /         -> list_contacts (?segment=&possibility=)
/// GET /groups   -> contact_groups
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(contacts::list_contacts))
        .route("/groups", get(contacts::contact_groups))
}
