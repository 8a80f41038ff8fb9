//! User entity model and DTOs.

use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash and the sealed SMTP password -- NEVER serialize
/// this to API responses directly. Use [`UserResponse`] instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    pub license_key_id: DbId,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    pub smtp_password_encrypted: Option<String>,
    pub app_password_hash: Option<String>,
    pub is_active: bool,
    pub failed_login_count: i32,
    pub locked_until: Option<Timestamp>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Whether host, port, username, and password are all present.
    pub fn has_smtp_settings(&self) -> bool {
        self.smtp_host.is_some()
            && self.smtp_port.is_some()
            && self.smtp_username.is_some()
            && self.smtp_password_encrypted.is_some()
    }
}

/// Safe user representation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub license_key_id: DbId,
    pub is_active: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role.clone(),
            license_key_id: user.license_key_id,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug)]
pub struct CreateUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    pub license_key_id: DbId,
}

/// SMTP settings as written by the settings page. `password_encrypted` of
/// `None` keeps the stored password.
#[derive(Debug)]
pub struct UpdateSmtpSettings {
    pub host: String,
    pub port: i32,
    pub username: String,
    pub password_encrypted: Option<String>,
}

/// Profile fields editable by the user.
#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub full_name: String,
}
