//! Admin handlers for license keys.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use courier_core::error::CoreError;
use courier_core::license::generate_license_key;
use courier_core::types::DbId;
use courier_db::models::license_key::{CreateLicenseKey, LicenseKey, LicenseKeyResponse};
use courier_db::repositories::LicenseKeyRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

const MAX_LABEL_LENGTH: usize = 120;

/// GET /api/v1/admin/license-keys
pub async fn list_license_keys(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<LicenseKeyResponse>>>> {
    let now = Utc::now();
    let keys = LicenseKeyRepo::list_with_usage(&state.pool)
        .await?
        .into_iter()
        .map(|(key, user_count)| LicenseKeyResponse {
            status: key.status_at(now),
            key,
            user_count,
        })
        .collect();
    Ok(Json(DataResponse { data: keys }))
}

/// POST /api/v1/admin/license-keys
///
/// Issue a new key. `expires_at`, when given, must be in the future.
pub async fn create_license_key(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(mut input): Json<CreateLicenseKey>,
) -> AppResult<(StatusCode, Json<DataResponse<LicenseKeyResponse>>)> {
    input.label = input.label.trim().to_string();
    if input.label.chars().count() > MAX_LABEL_LENGTH {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Label exceeds maximum length of {MAX_LABEL_LENGTH} characters"
        ))));
    }
    if let Some(expires_at) = input.expires_at {
        if expires_at <= Utc::now() {
            return Err(AppError::Core(CoreError::Validation(
                "Expiry must be in the future".into(),
            )));
        }
    }

    let key = LicenseKeyRepo::create(&state.pool, &generate_license_key(), &input).await?;
    tracing::info!(license_key_id = key.id, admin_id = admin.user_id, "License key issued");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: with_status(key, 0),
        }),
    ))
}

/// POST /api/v1/admin/license-keys/{id}/revoke
///
/// Users on a revoked key are refused at their next login or token refresh.
pub async fn revoke_license_key(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<LicenseKeyResponse>>> {
    let key = LicenseKeyRepo::revoke(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "LicenseKey",
            id,
        }))?;
    tracing::info!(license_key_id = id, admin_id = admin.user_id, "License key revoked");

    let user_count = LicenseKeyRepo::list_with_usage(&state.pool)
        .await?
        .into_iter()
        .find(|(k, _)| k.id == id)
        .map_or(0, |(_, count)| count);
    Ok(Json(DataResponse {
        data: with_status(key, user_count),
    }))
}

fn with_status(key: LicenseKey, user_count: i64) -> LicenseKeyResponse {
    LicenseKeyResponse {
        status: key.status(),
        key,
        user_count,
    }
}
