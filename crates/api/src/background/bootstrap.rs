//! One-off startup tasks that seed an empty database.

use courier_core::license::{normalize_license_key, validate_license_key_format};
use courier_db::models::license_key::CreateLicenseKey;
use courier_db::repositories::LicenseKeyRepo;
use sqlx::PgPool;

use crate::error::AppResult;

/// Label given to the key created from `BOOTSTRAP_LICENSE_KEY`.
pub const BOOTSTRAP_LABEL: &str = "bootstrap";

/// Make sure the configured bootstrap key exists.
///
/// Runs on every start. An existing key, revoked or not, is left untouched.
pub async fn ensure_license_key(pool: &PgPool, raw_key: &str) -> AppResult<bool> {
    let key = normalize_license_key(raw_key);
    validate_license_key_format(&key)?;

    let input = CreateLicenseKey {
        label: BOOTSTRAP_LABEL.to_string(),
        expires_at: None,
    };
    let created = LicenseKeyRepo::create_if_missing(pool, &key, &input).await?;
    if created {
        tracing::info!("Bootstrap license key created");
    } else {
        tracing::debug!("Bootstrap license key already present");
    }
    Ok(created)
}
