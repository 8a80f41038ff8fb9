//! Refresh-token sessions.

use chrono::{Duration, Utc};
use courier_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// One issued refresh token. Only its SHA-256 hash is stored; a session is
/// usable while it is neither revoked nor past `expires_at`.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub struct CreateSession {
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
}

impl CreateSession {
    /// A session for `user_id` that lives `ttl_days` from now.
    pub fn for_user(user_id: DbId, refresh_token_hash: String, ttl_days: i64) -> Self {
        Self {
            user_id,
            refresh_token_hash,
            expires_at: Utc::now() + Duration::days(ttl_days),
        }
    }
}
