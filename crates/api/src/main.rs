use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_api::background;
use courier_api::config::ServerConfig;
use courier_api::router::build_app_router;
use courier_api::state::AppState;
use courier_cloud::{AttachmentStore, S3AttachmentStore, S3Config, SheetsClient, SheetsConfig};
use courier_mail::{EmailConfig, SystemMailer};
use courier_worker::{MailDispatcher, SmtpTransportFactory, TransportFactory, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = courier_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    courier_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    courier_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    if let Some(key) = &config.bootstrap_license_key {
        background::bootstrap::ensure_license_key(&pool, key)
            .await
            .expect("Failed to seed BOOTSTRAP_LICENSE_KEY");
    }

    // --- Integrations ---
    let system_mailer = match EmailConfig::from_env() {
        Some(email_config) => {
            let mailer = SystemMailer::new(&email_config).expect("Invalid system SMTP settings");
            tracing::info!(host = %email_config.smtp_host, "System mailer configured");
            Some(Arc::new(mailer))
        }
        None => {
            tracing::warn!("SMTP_HOST not set; verification codes will be logged");
            None
        }
    };

    let sheets = match SheetsConfig::from_env() {
        Some(sheets_config) => {
            let client = SheetsClient::new(sheets_config).expect("Invalid spreadsheet settings");
            tracing::info!("Contact spreadsheet configured");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("SHEETS_SPREADSHEET_ID not set; contact endpoints will answer 503");
            None
        }
    };

    let attachment_store: Option<Arc<dyn AttachmentStore>> = match S3Config::from_env() {
        Some(s3_config) => {
            tracing::info!(bucket = %s3_config.bucket, "Attachment storage configured");
            Some(Arc::new(S3AttachmentStore::connect(s3_config).await))
        }
        None => {
            tracing::warn!("S3_BUCKET not set; oversized attachments will be rejected");
            None
        }
    };

    let transports: Arc<dyn TransportFactory> = Arc::new(SmtpTransportFactory);

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        system_mailer,
        sheets,
        attachment_store,
        transports: Arc::clone(&transports),
    };

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let housekeeping_handle = tokio::spawn(background::housekeeping::run(
        pool.clone(),
        cancel.clone(),
    ));

    let dispatcher_handle = if config.embedded_worker {
        let worker_config = WorkerConfig::from_env();
        let dispatcher = MailDispatcher::new(pool.clone(), &worker_config, transports);
        let cancel = cancel.clone();
        tracing::info!("Embedded mail dispatcher started");
        Some(tokio::spawn(async move { dispatcher.run(cancel).await }))
    } else {
        tracing::info!("WORKER_EMBEDDED=false; run courier-worker separately");
        None
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if let Some(handle) = dispatcher_handle {
        // Running jobs are requeued as their runners observe the cancellation.
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Mail dispatcher did not stop in time");
        }
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), housekeeping_handle).await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
