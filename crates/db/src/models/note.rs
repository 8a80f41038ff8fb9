//! Note model and DTOs.

use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Note {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a note.
#[derive(Debug, Deserialize)]
pub struct CreateNote {
    #[serde(default)]
    pub title: String,
    pub content: String,
}

/// DTO for updating a note. All fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
}
