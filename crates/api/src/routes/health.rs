//! Liveness endpoint, mounted at the root rather than under `/api/v1`.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub integrations: IntegrationStatus,
}

/// Which optional integrations this instance was started with. A `false`
/// here explains 503s from the contacts routes or rejected large uploads.
#[derive(Serialize)]
pub struct IntegrationStatus {
    pub sheets: bool,
    pub attachment_storage: bool,
    pub system_mail: bool,
}

impl IntegrationStatus {
    fn of(state: &AppState) -> Self {
        Self {
            sheets: state.sheets.is_some(),
            attachment_storage: state.attachment_store.is_some(),
            system_mail: state.system_mailer.is_some(),
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match courier_db::health_check(&state.pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        integrations: IntegrationStatus::of(&state),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
