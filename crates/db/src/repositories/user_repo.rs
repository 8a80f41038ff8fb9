//! Repository for the `users` table.

use courier_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user::{CreateUser, UpdateSmtpSettings, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, full_name, password_hash, role, license_key_id, \
                        smtp_host, smtp_port, smtp_username, smtp_password_encrypted, \
                        app_password_hash, is_active, failed_login_count, locked_until, \
                        last_login_at, created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, full_name, password_hash, role, license_key_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.full_name)
            .bind(&input.password_hash)
            .bind(&input.role)
            .bind(input.license_key_id)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by normalized (lower-case) email.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Soft-deactivate a user by setting `is_active = false`.
    ///
    /// Returns `true` if the row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = false WHERE id = $1 AND is_active = true")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one failed login, returning the new count.
    ///
    /// A lock that has already run out starts a fresh count, so the user gets
    /// the full number of attempts again after waiting it out.
    pub async fn increment_failed_login(pool: &PgPool, id: DbId) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE users SET
                failed_login_count = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= NOW() THEN 1
                    ELSE failed_login_count + 1
                END,
                locked_until = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= NOW() THEN NULL
                    ELSE locked_until
                END
             WHERE id = $1
             RETURNING failed_login_count",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Lock a user account until the specified timestamp.
    pub async fn lock_account(
        pool: &PgPool,
        id: DbId,
        until: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET locked_until = $2 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a successful login: reset `failed_login_count` to 0, clear `locked_until`,
    /// and set `last_login_at` to now.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                failed_login_count = 0,
                locked_until = NULL,
                last_login_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update a user's password hash. Also clears any lockout.
    /// Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, failed_login_count = 0, locked_until = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the display name.
    pub async fn update_full_name(
        pool: &PgPool,
        id: DbId,
        full_name: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("UPDATE users SET full_name = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(full_name)
            .fetch_optional(pool)
            .await
    }

    /// Store SMTP settings. A `None` password keeps the stored one.
    pub async fn update_smtp_settings(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSmtpSettings,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                smtp_host = $2,
                smtp_port = $3,
                smtp_username = $4,
                smtp_password_encrypted = COALESCE($5, smtp_password_encrypted)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&input.host)
            .bind(input.port)
            .bind(&input.username)
            .bind(&input.password_encrypted)
            .fetch_optional(pool)
            .await
    }

    /// Store the hashed app password.
    pub async fn update_app_password(
        pool: &PgPool,
        id: DbId,
        app_password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET app_password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(app_password_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
