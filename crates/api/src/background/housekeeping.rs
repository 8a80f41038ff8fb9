//! Periodic cleanup of expired verification codes and dead sessions.

use std::time::Duration;

use courier_db::repositories::{SessionRepo, VerificationCodeRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the housekeeping loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Housekeeping job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Housekeeping job stopping");
                break;
            }
            _ = interval.tick() => sweep(&pool).await,
        }
    }
}

/// One cleanup pass. Errors are logged; the next tick retries.
pub async fn sweep(pool: &PgPool) {
    match VerificationCodeRepo::delete_stale(pool).await {
        Ok(0) => tracing::debug!("Housekeeping: no stale verification codes"),
        Ok(deleted) => tracing::info!(deleted, "Housekeeping: purged verification codes"),
        Err(e) => tracing::error!(error = %e, "Housekeeping: verification code cleanup failed"),
    }

    match SessionRepo::delete_stale(pool).await {
        Ok(0) => tracing::debug!("Housekeeping: no stale sessions"),
        Ok(deleted) => tracing::info!(deleted, "Housekeeping: purged sessions"),
        Err(e) => tracing::error!(error = %e, "Housekeeping: session cleanup failed"),
    }
}
