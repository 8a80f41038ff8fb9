//! Route definitions for the `/settings` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// Routes mounted at `/settings`. All require auth.
///
/// ```text
/// GET  /              -> get_settings
/// PUT  /profile       -> update_profile
/// PUT  /smtp          -> update_smtp
/// POST /smtp/test     -> test_smtp
/// PUT  /app-password  -> update_app_password
/// PUT  /password      -> change_password
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(settings::get_settings))
        .route("/profile", put(settings::update_profile))
        .route("/smtp", put(settings::update_smtp))
        .route("/smtp/test", post(settings::test_smtp))
        .route("/app-password", put(settings::update_app_password))
        .route("/password", put(settings::change_password))
}
