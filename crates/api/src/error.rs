use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier_cloud::sheets::SheetsError;
use courier_cloud::storage::StorageError;
use courier_core::error::CoreError;
use serde_json::json;

/// Error type returned by every Courier handler.
///
/// Rendered as `{ "error": message, "code": CODE }`. The message is shown to
/// the user as-is, so anything internal is replaced with a generic text and
/// logged instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed input the extractor could not reject on its own (bad
    /// multipart fields, unreadable uploads).
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<SheetsError> for AppError {
    fn from(err: SheetsError) -> Self {
        AppError::Core(CoreError::Unavailable(format!(
            "Contact spreadsheet could not be read: {err}"
        )))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Core(CoreError::Unavailable(err.to_string()))
    }
}

/// Status, machine code and user-facing message for one error.
struct Rendered {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl Rendered {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        )
    }
}

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            AppError::Core(core) => render_core(core),
            AppError::Database(err) => render_sqlx(err),
            AppError::BadRequest(msg) => Rendered::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                Rendered::internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Rendered {
            status,
            code,
            message,
        } = self.render();
        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}

fn render_core(err: &CoreError) -> Rendered {
    match err {
        CoreError::NotFound { entity, id } => Rendered::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => {
            Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
        CoreError::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, "CONFLICT", msg),
        CoreError::Unauthorized(msg) => {
            Rendered::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
        }
        CoreError::Forbidden(msg) => Rendered::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg),
        CoreError::Unavailable(msg) => {
            tracing::warn!(error = %msg, "Integration unavailable");
            Rendered::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            Rendered::internal()
        }
    }
}

/// `RowNotFound` is a 404 and unique violations on `uq_*` constraints are a
/// 409; every other database failure is logged and hidden behind a 500.
fn render_sqlx(err: &sqlx::Error) -> Rendered {
    if let sqlx::Error::RowNotFound = err {
        return Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found");
    }

    let constraint = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.constraint())
        .filter(|name| name.starts_with("uq_"));
    if let Some(name) = constraint {
        return Rendered::new(StatusCode::CONFLICT, "CONFLICT", conflict_message(name));
    }

    tracing::error!(error = %err, "Database error");
    Rendered::internal()
}

fn conflict_message(constraint: &str) -> String {
    match constraint {
        "uq_users_email" => "An account with this email already exists".to_string(),
        "uq_license_keys_key" => "That license key already exists".to_string(),
        other => format!("Duplicate value violates unique constraint: {other}"),
    }
}
