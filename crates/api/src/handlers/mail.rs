//! Handlers for bulk sends and their progress.
//!
//! `POST /mail/bulk` only validates and queues; delivery happens in the
//! dispatcher. The browser polls `GET /mail/jobs/{id}` for progress.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_core::bulk_mail::{
    encode_attachment, sanitize_filename, BulkMailDraft, EncodedAttachment, HostedAttachment,
    MAX_ATTACHMENTS, MAX_ATTACHMENT_BYTES, MAX_INLINE_ATTACHMENT_BYTES,
};
use courier_core::contacts::{dedupe_emails, filter_contacts, ContactFilter};
use courier_core::error::CoreError;
use courier_core::types::DbId;
use courier_db::models::mail_job::{EnqueueMailJob, MailJobProgressResponse};
use courier_db::models::user::User;
use courier_db::repositories::MailJobRepo;

use super::auth::ensure_license_usable;
use super::contacts::load_contacts;
use super::load_current_user;
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Fields collected from the bulk-send form.
#[derive(Debug, Default)]
struct BulkForm {
    subject: String,
    html_body: String,
    app_password: String,
    recipients: Vec<String>,
    filter: ContactFilter,
    include_contacts: bool,
    files: Vec<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// POST /api/v1/mail/bulk (multipart)
///
/// Text fields: `subject`, `html_body`, `app_password`, repeated `recipient`,
/// repeated `segment` and `possibility`, optional `include_contacts`. File
/// fields: `attachment`. A segment or possibility field pulls matching rows
/// from the contact sheet; `include_contacts=true` with no filter pulls every
/// row. Returns 202 with the queued job.
pub async fn send_bulk(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<MailJobProgressResponse>>)> {
    let form = read_form(multipart).await?;
    let user = load_current_user(&state.pool, auth.user_id).await?;
    ensure_license_usable(&state.pool, user.license_key_id).await?;
    verify_app_password(&user, &form.app_password)?;

    let mut candidates = form.recipients;
    if form.include_contacts || !form.filter.is_empty() {
        let contacts = filter_contacts(load_contacts(&state).await?, &form.filter);
        candidates.extend(contacts.into_iter().map(|c| c.email));
    }
    let recipients = dedupe_emails(candidates);

    if form.files.len() > MAX_ATTACHMENTS {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Too many attachments ({}); the limit is {MAX_ATTACHMENTS}",
            form.files.len()
        ))));
    }

    let mut draft = BulkMailDraft {
        subject: form.subject,
        html_body: form.html_body,
        recipients,
        ..Default::default()
    };
    // Validated again below once attachments are placed.
    draft.validate()?;

    let (attachments, hosted) = place_attachments(&state, user.id, form.files).await?;
    draft.attachments = attachments;
    draft.hosted_attachments = hosted;
    draft.validate()?;

    let total_recipients = i32::try_from(draft.recipients.len())
        .map_err(|_| AppError::BadRequest("Too many recipients".into()))?;
    let subject = draft.subject.trim().to_string();
    let payload = draft.into_payload();

    let job = MailJobRepo::enqueue(
        &state.pool,
        &EnqueueMailJob {
            user_id: user.id,
            subject,
            payload: payload.to_json(),
            total_recipients,
        },
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        user_id = user.id,
        recipients = total_recipients,
        inline_attachments = payload.attachments.len(),
        hosted_attachments = payload.hosted_attachments.len(),
        "Bulk mail job queued",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: MailJobProgressResponse::from(job),
        }),
    ))
}

/// GET /api/v1/mail/jobs?limit=&offset=
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<MailJobProgressResponse>>>> {
    let (limit, offset) = params.resolve();
    let jobs = MailJobRepo::list_for_user(&state.pool, auth.user_id, limit, offset).await?;
    Ok(Json(DataResponse {
        data: jobs.into_iter().map(MailJobProgressResponse::from).collect(),
    }))
}

/// GET /api/v1/mail/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MailJobProgressResponse>>> {
    let job = MailJobRepo::find_summary_for_user(&state.pool, auth.user_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "MailJob",
            id,
        }))?;
    Ok(Json(DataResponse {
        data: MailJobProgressResponse::from(job),
    }))
}

/// POST /api/v1/mail/jobs/{id}/cancel
///
/// A pending job is cancelled at once; a running one stops before its next
/// recipient. A finished job answers 409.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MailJobProgressResponse>>> {
    let stopped = MailJobRepo::request_stop(&state.pool, auth.user_id, id).await?;
    let job = MailJobRepo::find_summary_for_user(&state.pool, auth.user_id, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "MailJob",
            id,
        }))?;

    if !stopped {
        return Err(AppError::Core(CoreError::Conflict(
            "Mail job has already finished".into(),
        )));
    }

    tracing::info!(job_id = id, user_id = auth.user_id, "Stop requested for mail job");
    Ok(Json(DataResponse {
        data: MailJobProgressResponse::from(job),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn read_form(mut multipart: Multipart) -> AppResult<BulkForm> {
    let mut form = BulkForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "attachment" => {
                let filename = sanitize_filename(field.file_name().unwrap_or("attachment"));
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read attachment: {e}")))?;
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > MAX_ATTACHMENT_BYTES {
                    return Err(AppError::Core(CoreError::Validation(format!(
                        "Attachment '{filename}' exceeds {MAX_ATTACHMENT_BYTES} bytes"
                    ))));
                }
                form.files.push(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid field '{name}': {e}")))?;
                match name.as_str() {
                    "subject" => form.subject = value,
                    "html_body" => form.html_body = value,
                    "app_password" => form.app_password = value,
                    "recipient" => form.recipients.extend(split_list(&value)),
                    "segment" => form.filter.segments.extend(split_list(&value)),
                    "possibility" => form.filter.possibilities.extend(split_list(&value)),
                    "include_contacts" => {
                        form.include_contacts = matches!(value.trim(), "true" | "1" | "on")
                    }
                    other => tracing::debug!(field = other, "Ignoring unknown form field"),
                }
            }
        }
    }

    Ok(form)
}

/// Split a textarea or comma list into trimmed, non-empty entries.
fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn verify_app_password(user: &User, app_password: &str) -> AppResult<()> {
    let hash = user.app_password_hash.as_deref().ok_or_else(|| {
        AppError::Core(CoreError::Forbidden(
            "Set an app password in settings before sending".into(),
        ))
    })?;
    let valid = verify_password(app_password, hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !valid {
        return Err(AppError::Core(CoreError::Forbidden(
            "App password is incorrect".into(),
        )));
    }
    Ok(())
}

/// Keep attachments inline until the inline budget is spent; host the rest.
async fn place_attachments(
    state: &AppState,
    owner_id: DbId,
    files: Vec<UploadedFile>,
) -> AppResult<(Vec<EncodedAttachment>, Vec<HostedAttachment>)> {
    let mut inline = Vec::new();
    let mut hosted = Vec::new();
    let mut inline_bytes = 0usize;

    for file in files {
        if inline_bytes + file.bytes.len() <= MAX_INLINE_ATTACHMENT_BYTES {
            inline_bytes += file.bytes.len();
            inline.push(encode_attachment(&file.filename, &file.content_type, &file.bytes));
            continue;
        }

        let store = state.attachment_store.as_ref().ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Attachments exceed {MAX_INLINE_ATTACHMENT_BYTES} bytes and no attachment storage is configured"
            )))
        })?;
        let link = store
            .store(owner_id, &file.filename, &file.content_type, file.bytes)
            .await?;
        hosted.push(link);
    }

    Ok((inline, hosted))
}
