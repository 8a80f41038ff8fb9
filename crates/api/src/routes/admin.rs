//! Route definitions for the `/admin` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::license_keys;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET  /license-keys              -> list_license_keys
/// POST /license-keys              -> create_license_key
/// POST /license-keys/{id}/revoke  -> revoke_license_key
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/license-keys",
            get(license_keys::list_license_keys).post(license_keys::create_license_key),
        )
        .route(
            "/license-keys/{id}/revoke",
            post(license_keys::revoke_license_key),
        )
}
