//! Repository for the `license_keys` table.

use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::license_key::{CreateLicenseKey, LicenseKey};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, key, label, expires_at, is_revoked, created_at, updated_at";

/// Provides CRUD operations for license keys.
pub struct LicenseKeyRepo;

impl LicenseKeyRepo {
    /// Insert a key with the given (already generated) key string.
    pub async fn create(
        pool: &PgPool,
        key: &str,
        input: &CreateLicenseKey,
    ) -> Result<LicenseKey, sqlx::Error> {
        let query = format!(
            "INSERT INTO license_keys (key, label, expires_at)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LicenseKey>(&query)
            .bind(key)
            .bind(&input.label)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Insert a key unless one with the same string already exists.
    ///
    /// Returns `true` when a row was created.
    pub async fn create_if_missing(
        pool: &PgPool,
        key: &str,
        input: &CreateLicenseKey,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO license_keys (key, label, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(&input.label)
        .bind(input.expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<LicenseKey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM license_keys WHERE id = $1");
        sqlx::query_as::<_, LicenseKey>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a key by its normalized key string.
    pub async fn find_by_key(pool: &PgPool, key: &str) -> Result<Option<LicenseKey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM license_keys WHERE key = $1");
        sqlx::query_as::<_, LicenseKey>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// List keys with the number of users attached to each, newest first.
    pub async fn list_with_usage(pool: &PgPool) -> Result<Vec<(LicenseKey, i64)>, sqlx::Error> {
        let keys = sqlx::query_as::<_, LicenseKey>(&format!(
            "SELECT {COLUMNS} FROM license_keys ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(pool)
        .await?;

        let counts: Vec<(DbId, i64)> = sqlx::query_as(
            "SELECT license_key_id, COUNT(*) FROM users GROUP BY license_key_id",
        )
        .fetch_all(pool)
        .await?;

        Ok(keys
            .into_iter()
            .map(|k| {
                let count = counts
                    .iter()
                    .find(|(id, _)| *id == k.id)
                    .map_or(0, |(_, c)| *c);
                (k, count)
            })
            .collect())
    }

    /// Revoke a key. Returns `None` if no such key exists.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<Option<LicenseKey>, sqlx::Error> {
        let query = format!(
            "UPDATE license_keys SET is_revoked = true WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LicenseKey>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
