//! License key model and DTOs.

use courier_core::license::LicenseStatus;
use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `license_keys` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LicenseKey {
    pub id: DbId,
    pub key: String,
    pub label: String,
    pub expires_at: Option<Timestamp>,
    pub is_revoked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LicenseKey {
    /// Effective status at `now`.
    pub fn status_at(&self, now: Timestamp) -> LicenseStatus {
        LicenseStatus::evaluate(self.is_revoked, self.expires_at, now)
    }

    /// Effective status right now.
    pub fn status(&self) -> LicenseStatus {
        self.status_at(chrono::Utc::now())
    }
}

/// DTO for issuing a new key. The key string itself is generated server-side.
#[derive(Debug, Deserialize)]
pub struct CreateLicenseKey {
    #[serde(default)]
    pub label: String,
    pub expires_at: Option<Timestamp>,
}

/// License key plus derived status and usage, for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseKeyResponse {
    #[serde(flatten)]
    pub key: LicenseKey,
    pub status: LicenseStatus,
    pub user_count: i64,
}
