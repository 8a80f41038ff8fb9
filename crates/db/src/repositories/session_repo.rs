//! Repository for the `user_sessions` table.

use courier_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::session::{CreateSession, UserSession};

const COLUMNS: &str =
    "id, user_id, refresh_token_hash, expires_at, is_revoked, created_at, updated_at";

pub struct SessionRepo;

impl SessionRepo {
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        insert(pool, input).await
    }

    /// Find an active session by its refresh token hash.
    ///
    /// Only returns sessions that are not revoked and not expired.
    pub async fn find_by_refresh_token_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_sessions
             WHERE refresh_token_hash = $1
               AND is_revoked = false
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Revoke `old_id` and insert its replacement in one transaction.
    ///
    /// Returns `None` if the old session was already revoked, which means a
    /// concurrent refresh won the race with the same token.
    pub async fn rotate(
        pool: &PgPool,
        old_id: DbId,
        replacement: &CreateSession,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true WHERE id = $1 AND is_revoked = false",
        )
        .bind(old_id)
        .execute(&mut *tx)
        .await?;
        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let session = insert(&mut *tx, replacement).await?;
        tx.commit().await?;
        Ok(Some(session))
    }

    /// Revoke all active sessions for a user. Returns the count of revoked sessions.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired or revoked sessions. Returns the count of deleted rows.
    pub async fn delete_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM user_sessions WHERE expires_at < NOW() OR is_revoked = true")
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}

async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    input: &CreateSession,
) -> Result<UserSession, sqlx::Error> {
    let query = format!(
        "INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at)
         VALUES ($1, $2, $3)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, UserSession>(&query)
        .bind(input.user_id)
        .bind(&input.refresh_token_hash)
        .bind(input.expires_at)
        .fetch_one(executor)
        .await
}
