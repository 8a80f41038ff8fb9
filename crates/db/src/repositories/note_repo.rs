//! Repository for the `notes` table.
//!
//! Every query is scoped by `user_id`: a note that belongs to someone else is
//! indistinguishable from one that does not exist.

use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::note::{CreateNote, Note, UpdateNote};

const COLUMNS: &str = "id, user_id, title, content, created_at, updated_at";

pub struct NoteRepo;

impl NoteRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateNote,
    ) -> Result<Note, sqlx::Error> {
        let query = format!(
            "INSERT INTO notes (user_id, title, content)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(user_id)
            .bind(&input.title)
            .bind(&input.content)
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_user(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<Note>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notes WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's notes, most recently edited first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Note>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notes
             WHERE user_id = $1
             ORDER BY updated_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Apply the non-`None` fields. Returns `None` if the note is not the user's.
    pub async fn update_for_user(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        input: &UpdateNote,
    ) -> Result<Option<Note>, sqlx::Error> {
        let query = format!(
            "UPDATE notes SET
                title = COALESCE($3, title),
                content = COALESCE($4, content)
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&input.title)
            .bind(&input.content)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete_for_user(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
