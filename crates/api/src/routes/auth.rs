//! Route definitions for the `/auth` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /register           -> register
/// POST /login              -> login
/// POST /refresh            -> refresh
/// POST /logout             -> logout (requires auth)
/// POST /verification-code  -> request_verification_code
/// POST /password-reset     -> reset_password
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/verification-code", post(auth::request_verification_code))
        .route("/password-reset", post(auth::reset_password))
}
