//! Handlers for personal notes.
//!
//! Every query is scoped to the caller; another user's note answers 404.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_core::error::CoreError;
use courier_core::notes::{validate_note_content, validate_note_title};
use courier_core::types::DbId;
use courier_db::models::note::{CreateNote, Note, UpdateNote};
use courier_db::repositories::NoteRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/notes?limit=&offset=
pub async fn list_notes(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<Note>>>> {
    let (limit, offset) = params.resolve();
    let notes = NoteRepo::list_for_user(&state.pool, auth.user_id, limit, offset).await?;
    Ok(Json(DataResponse { data: notes }))
}

/// POST /api/v1/notes
pub async fn create_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(mut input): Json<CreateNote>,
) -> AppResult<(StatusCode, Json<DataResponse<Note>>)> {
    input.title = input.title.trim().to_string();
    validate_note_title(&input.title)?;
    validate_note_content(&input.content)?;

    let note = NoteRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::info!(note_id = note.id, user_id = auth.user_id, "Note created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: note })))
}

/// GET /api/v1/notes/{id}
pub async fn get_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Note>>> {
    let note = NoteRepo::find_for_user(&state.pool, auth.user_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Note", id }))?;
    Ok(Json(DataResponse { data: note }))
}

/// PUT /api/v1/notes/{id}
pub async fn update_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateNote>,
) -> AppResult<Json<DataResponse<Note>>> {
    if let Some(title) = input.title.as_mut() {
        *title = title.trim().to_string();
        validate_note_title(title)?;
    }
    if let Some(content) = &input.content {
        validate_note_content(content)?;
    }

    let note = NoteRepo::update_for_user(&state.pool, auth.user_id, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Note", id }))?;
    Ok(Json(DataResponse { data: note }))
}

/// DELETE /api/v1/notes/{id}
pub async fn delete_note(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let deleted = NoteRepo::delete_for_user(&state.pool, auth.user_id, id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound { entity: "Note", id }));
    }
    tracing::info!(note_id = id, user_id = auth.user_id, "Note deleted");
    Ok(StatusCode::NO_CONTENT)
}
