//! Bearer-token extractor for authenticated Courier routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use courier_core::error::CoreError;
use courier_core::roles::ROLE_ADMIN;
use courier_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The caller behind an access token. Handlers that take this parameter are
/// only reachable with a valid, unexpired token; the user row itself is
/// loaded by the handler when it needs more than the id.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Access token is invalid or expired"))?;

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

/// Pull the token out of `Authorization: Bearer <token>`. The scheme is
/// matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("Sign in required"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                return Err(unauthorized("Bearer token is empty"));
            }
            Ok(token)
        }
        _ => Err(unauthorized("Authorization header must use the Bearer scheme")),
    }
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}
