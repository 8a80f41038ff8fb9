//! Repository for the `verification_codes` table.

use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::verification_code::{CreateVerificationCode, VerificationCode};

const COLUMNS: &str =
    "id, user_id, code_hash, purpose, expires_at, attempts, consumed_at, created_at";

pub struct VerificationCodeRepo;

impl VerificationCodeRepo {
    /// Store a new code, invalidating any outstanding code for the same
    /// user and purpose so only the latest one works.
    pub async fn replace(
        pool: &PgPool,
        input: &CreateVerificationCode,
    ) -> Result<VerificationCode, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE verification_codes SET consumed_at = NOW()
             WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL",
        )
        .bind(input.user_id)
        .bind(&input.purpose)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO verification_codes (user_id, code_hash, purpose, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let code = sqlx::query_as::<_, VerificationCode>(&query)
            .bind(input.user_id)
            .bind(&input.code_hash)
            .bind(&input.purpose)
            .bind(input.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(code)
    }

    /// Check a guess against the user's outstanding code for `purpose`.
    ///
    /// A match consumes the code and returns `true`. A mismatch counts one
    /// attempt; once `max_attempts` wrong guesses are reached the code is
    /// burned and even the right code is refused. The row is locked for the
    /// check so concurrent guesses are counted one by one.
    pub async fn consume(
        pool: &PgPool,
        user_id: DbId,
        purpose: &str,
        code_hash: &str,
        max_attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let outstanding: Option<(DbId, String)> = sqlx::query_as(
            "SELECT id, code_hash FROM verification_codes
             WHERE user_id = $1
               AND purpose = $2
               AND consumed_at IS NULL
               AND expires_at > NOW()
             ORDER BY created_at DESC, id DESC
             LIMIT 1
             FOR UPDATE",
        )
        .bind(user_id)
        .bind(purpose)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, stored_hash)) = outstanding else {
            tx.rollback().await?;
            return Ok(false);
        };

        let matched = stored_hash == code_hash;
        if matched {
            sqlx::query("UPDATE verification_codes SET consumed_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                "UPDATE verification_codes SET
                    attempts = attempts + 1,
                    consumed_at = CASE WHEN attempts + 1 >= $2 THEN NOW() ELSE consumed_at END
                 WHERE id = $1",
            )
            .bind(id)
            .bind(max_attempts)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(matched)
    }

    /// Delete codes that are consumed or expired. Returns the count deleted.
    pub async fn delete_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM verification_codes WHERE consumed_at IS NOT NULL OR expires_at < NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
