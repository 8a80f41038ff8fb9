//! Handlers for the `/settings` resource: profile, SMTP account, app password
//! and login password.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use courier_core::error::CoreError;
use courier_core::license::LicenseStatus;
use courier_core::validation::{validate_full_name, validate_smtp_server};
use courier_db::models::user::{UpdateProfile, UpdateSmtpSettings, User, UserResponse};
use courier_db::repositories::{LicenseKeyRepo, SessionRepo, UserRepo};
use courier_mail::OutgoingMail;
use courier_worker::runner::{sender_address, smtp_credentials};
use serde::{Deserialize, Serialize};

use super::load_current_user;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// App passwords only gate bulk sends, so the bar is lower than for logins.
const MIN_APP_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Serialize)]
pub struct SmtpSettingsView {
    pub host: Option<String>,
    pub port: Option<i32>,
    pub username: Option<String>,
    pub has_password: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub user: UserResponse,
    pub smtp: SmtpSettingsView,
    pub has_app_password: bool,
    pub license_status: LicenseStatus,
    pub license_expires_at: Option<courier_core::types::Timestamp>,
}

#[derive(Debug, Deserialize)]
pub struct SmtpSettingsRequest {
    pub host: String,
    pub port: i32,
    pub username: String,
    /// Omit to keep the stored password.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppPasswordRequest {
    pub current_password: String,
    pub app_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/v1/settings
pub async fn get_settings(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<SettingsResponse>>> {
    let user = load_current_user(&state.pool, auth.user_id).await?;
    let response = build_settings(&state, &user).await?;
    Ok(Json(DataResponse { data: response }))
}

/// PUT /api/v1/settings/profile
pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateProfile>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let full_name = input.full_name.trim();
    validate_full_name(full_name)?;

    let user = UserRepo::update_full_name(&state.pool, auth.user_id, full_name)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PUT /api/v1/settings/smtp
///
/// The password is sealed with the server key before it is stored. It may be
/// omitted once a password is on file.
pub async fn update_smtp(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SmtpSettingsRequest>,
) -> AppResult<Json<DataResponse<SettingsResponse>>> {
    let host = input.host.trim().to_string();
    validate_smtp_server(&host, input.port)?;
    let username = input.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "SMTP username cannot be empty".into(),
        )));
    }

    let current = load_current_user(&state.pool, auth.user_id).await?;
    let password_encrypted = match input.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(
            state
                .config
                .smtp_secret_key
                .seal(password)
                .map_err(|e| AppError::InternalError(format!("Failed to seal SMTP password: {e}")))?,
        ),
        None if current.smtp_password_encrypted.is_some() => None,
        None => {
            return Err(AppError::Core(CoreError::Validation(
                "SMTP password is required".into(),
            )))
        }
    };

    let user = UserRepo::update_smtp_settings(
        &state.pool,
        auth.user_id,
        &UpdateSmtpSettings {
            host,
            port: input.port,
            username,
            password_encrypted,
        },
    )
    .await?
    .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    tracing::info!(user_id = user.id, "SMTP settings updated");
    let response = build_settings(&state, &user).await?;
    Ok(Json(DataResponse { data: response }))
}

/// PUT /api/v1/settings/app-password
///
/// Set the password that must accompany every bulk send. Requires the login
/// password.
pub async fn update_app_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AppPasswordRequest>,
) -> AppResult<StatusCode> {
    let user = load_current_user(&state.pool, auth.user_id).await?;
    require_login_password(&user, &input.current_password)?;

    if input.app_password.chars().count() < MIN_APP_PASSWORD_LENGTH {
        return Err(AppError::Core(CoreError::Validation(format!(
            "App password must be at least {MIN_APP_PASSWORD_LENGTH} characters"
        ))));
    }
    let hash = hash_password(&input.app_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_app_password(&state.pool, user.id, &hash).await?;

    tracing::info!(user_id = user.id, "App password updated");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/settings/password
///
/// Change the login password. Every session is revoked; the client logs in
/// again.
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let user = load_current_user(&state.pool, auth.user_id).await?;
    require_login_password(&user, &input.current_password)?;
    validate_password_strength(&input.new_password)?;

    let hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &hash).await?;
    SessionRepo::revoke_all_for_user(&state.pool, user.id).await?;

    tracing::info!(user_id = user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/settings/smtp/test
///
/// Send a short message to the user's own address with their stored SMTP
/// settings.
pub async fn test_smtp(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = load_current_user(&state.pool, auth.user_id).await?;
    let credentials = smtp_credentials(&user, &state.config.smtp_secret_key)
        .map_err(AppError::BadRequest)?;

    let transport = state
        .transports
        .connect(&credentials)
        .map_err(|e| AppError::BadRequest(format!("SMTP connection failed: {e}")))?;

    let mail = OutgoingMail {
        from_address: sender_address(&user),
        from_name: Some(user.full_name.clone()),
        to: user.email.clone(),
        subject: "Courier SMTP test".to_string(),
        html_body: "<p>Your SMTP settings work. Bulk sends will use this account.</p>"
            .to_string(),
        attachments: Vec::new(),
    };

    transport.send(&mail).await.map_err(|e| {
        tracing::warn!(user_id = user.id, error = %e, "SMTP test failed");
        AppError::BadRequest(format!("SMTP test failed: {e}"))
    })?;

    Ok(Json(DataResponse {
        data: MessageResponse {
            message: "Test email sent",
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_login_password(user: &User, password: &str) -> AppResult<()> {
    let valid = verify_password(password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !valid {
        return Err(AppError::Core(CoreError::Forbidden(
            "Current password is incorrect".into(),
        )));
    }
    Ok(())
}

async fn build_settings(state: &AppState, user: &User) -> AppResult<SettingsResponse> {
    let license = LicenseKeyRepo::find_by_id(&state.pool, user.license_key_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!("License key {} missing for user", user.license_key_id))
        })?;

    Ok(SettingsResponse {
        user: UserResponse::from(user),
        smtp: SmtpSettingsView {
            host: user.smtp_host.clone(),
            port: user.smtp_port,
            username: user.smtp_username.clone(),
            has_password: user.smtp_password_encrypted.is_some(),
        },
        has_app_password: user.app_password_hash.is_some(),
        license_status: license.status(),
        license_expires_at: license.expires_at,
    })
}
