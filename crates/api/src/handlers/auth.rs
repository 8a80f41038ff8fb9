//! Handlers for the `/auth` resource: registration, login, token refresh,
//! logout and password reset by emailed code.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use courier_core::error::CoreError;
use courier_core::license::{ensure_usable, normalize_license_key, validate_license_key_format};
use courier_core::roles::{ROLE_ADMIN, ROLE_USER};
use courier_core::types::DbId;
use courier_core::validation::{normalize_email, validate_email, validate_full_name};
use courier_core::verification::{self, PURPOSE_PASSWORD_RESET};
use courier_db::models::session::CreateSession;
use courier_db::models::user::{CreateUser, User, UserResponse};
use courier_db::models::verification_code::CreateVerificationCode;
use courier_db::repositories::{LicenseKeyRepo, SessionRepo, UserRepo, VerificationCodeRepo};
use courier_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{generate_access_token, generate_refresh_token, hash_refresh_token};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// Maximum consecutive failed login attempts before locking the account.
const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Duration in minutes to lock an account after exceeding failed attempts.
const LOCK_DURATION_MINS: i64 = 15;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_CODE: &str = "Invalid or expired verification code";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub license_key: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerificationCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account bound to a usable license key. Returns tokens (201).
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&input.email);
    validate_email(&email)?;
    let full_name = input.full_name.trim().to_string();
    validate_full_name(&full_name)?;
    validate_password_strength(&input.password)?;

    let key = normalize_license_key(&input.license_key);
    validate_license_key_format(&key)?;
    let license = LicenseKeyRepo::find_by_key(&state.pool, &key)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Forbidden("License key is not valid".into())))?;
    ensure_usable(license.status())?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "An account with this email already exists".into(),
        )));
    }

    let role = if state.config.is_admin_email(&email) {
        ROLE_ADMIN
    } else {
        ROLE_USER
    };
    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email,
            full_name,
            password_hash,
            role: role.to_string(),
            license_key_id: license.id,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, license_key_id = license.id, role, "User registered");

    let response = create_auth_response(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&input.email);
    let user = UserRepo::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized(INVALID_CREDENTIALS.into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    if let Some(locked_until) = user.locked_until {
        if locked_until > Utc::now() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Account is temporarily locked. Try again later.".into(),
            )));
        }
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        let failures = UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if failures >= MAX_FAILED_ATTEMPTS {
            let lock_until = Utc::now() + chrono::Duration::minutes(LOCK_DURATION_MINS);
            UserRepo::lock_account(&state.pool, user.id, lock_until).await?;
            tracing::warn!(user_id = user.id, failures, "Account locked after failed logins");
        }
        return Err(AppError::Core(CoreError::Unauthorized(
            INVALID_CREDENTIALS.into(),
        )));
    }

    ensure_license_usable(&state.pool, user.license_key_id).await?;

    UserRepo::record_successful_login(&state.pool, user.id).await?;

    let response = create_auth_response(&state, &user).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a valid refresh token for new tokens. The old session is revoked
/// in the same transaction; replaying it fails.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token_hash = hash_refresh_token(&input.refresh_token);

    let session = SessionRepo::find_by_refresh_token_hash(&state.pool, &token_hash)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }
    ensure_license_usable(&state.pool, user.license_key_id).await?;

    let (refresh_plaintext, refresh_hash) = generate_refresh_token();
    let replacement = new_session(&state, user.id, refresh_hash);
    SessionRepo::rotate(&state.pool, session.id, &replacement)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    let response = build_auth_response(&state, &user, refresh_plaintext)?;
    Ok(Json(response))
}

/// POST /api/v1/auth/logout
///
/// Revoke all sessions for the authenticated user. Returns 204 No Content.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    let revoked = SessionRepo::revoke_all_for_user(&state.pool, auth_user.user_id).await?;
    tracing::info!(user_id = auth_user.user_id, revoked, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/verification-code
///
/// Issue a password-reset code. Always answers 202 so the endpoint cannot be
/// used to discover which emails have accounts.
pub async fn request_verification_code(
    State(state): State<AppState>,
    Json(input): Json<VerificationCodeRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MessageResponse>>)> {
    let accepted = (
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: MessageResponse {
                message: "If the account exists, a verification code has been sent",
            },
        }),
    );

    let email = normalize_email(&input.email);
    let Some(user) = UserRepo::find_by_email(&state.pool, &email).await? else {
        tracing::debug!("Verification code requested for unknown email");
        return Ok(accepted);
    };
    if !user.is_active {
        return Ok(accepted);
    }

    let issued = verification::issue_code(state.config.verification_secret.as_bytes(), Utc::now());
    VerificationCodeRepo::replace(
        &state.pool,
        &CreateVerificationCode {
            user_id: user.id,
            code_hash: issued.hash,
            purpose: PURPOSE_PASSWORD_RESET.to_string(),
            expires_at: issued.expires_at,
        },
    )
    .await?;

    match &state.system_mailer {
        Some(mailer) => {
            if let Err(e) = mailer
                .send_verification_code(&user.email, &issued.plaintext, verification::CODE_TTL_MINUTES)
                .await
            {
                tracing::error!(user_id = user.id, error = %e, "Failed to email verification code");
            }
        }
        None => {
            tracing::debug!(
                user_id = user.id,
                code = %issued.plaintext,
                "No system mailer configured; verification code logged instead",
            );
        }
    }

    Ok(accepted)
}

/// POST /api/v1/auth/password-reset
///
/// Consume a verification code and set a new password. All sessions are
/// revoked. Returns 204.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<PasswordResetRequest>,
) -> AppResult<StatusCode> {
    validate_password_strength(&input.new_password)?;
    if !verification::is_well_formed(&input.code) {
        return Err(AppError::Core(CoreError::Validation(
            "Verification code must be 6 digits".into(),
        )));
    }

    let email = normalize_email(&input.email);
    let user = UserRepo::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized(INVALID_CODE.into())))?;

    let code_hash =
        verification::hash_code(state.config.verification_secret.as_bytes(), &input.code);
    let consumed =
        VerificationCodeRepo::consume(
            &state.pool,
            user.id,
            PURPOSE_PASSWORD_RESET,
            &code_hash,
            verification::MAX_CODE_ATTEMPTS,
        )
        .await?;
    if !consumed {
        return Err(AppError::Core(CoreError::Unauthorized(INVALID_CODE.into())));
    }

    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &password_hash).await?;
    SessionRepo::revoke_all_for_user(&state.pool, user.id).await?;

    tracing::info!(user_id = user.id, "Password reset with verification code");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject users whose license key has been revoked or has expired.
pub(crate) async fn ensure_license_usable(pool: &DbPool, license_key_id: DbId) -> AppResult<()> {
    let license = LicenseKeyRepo::find_by_id(pool, license_key_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalError(format!("License key {license_key_id} missing for user"))
        })?;
    ensure_usable(license.status())?;
    Ok(())
}

fn new_session(state: &AppState, user_id: DbId, refresh_token_hash: String) -> CreateSession {
    CreateSession::for_user(
        user_id,
        refresh_token_hash,
        state.config.jwt.refresh_token_expiry_days,
    )
}

/// Persist a fresh session and build the token response.
async fn create_auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let (refresh_plaintext, refresh_hash) = generate_refresh_token();
    SessionRepo::create(&state.pool, &new_session(state, user.id, refresh_hash)).await?;
    build_auth_response(state, user, refresh_plaintext)
}

fn build_auth_response(
    state: &AppState,
    user: &User,
    refresh_token: String,
) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user.id, &user.role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(AuthResponse {
        access_token,
        refresh_token,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserResponse::from(user),
    })
}
