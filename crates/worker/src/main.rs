use std::sync::Arc;

use courier_worker::{MailDispatcher, SmtpTransportFactory, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    let config = WorkerConfig::from_env();

    let pool = courier_db::create_pool(&database_url).await?;
    courier_db::health_check(&pool).await?;
    tracing::info!("Database connection established");

    let cancel = CancellationToken::new();
    let dispatcher = MailDispatcher::new(pool.clone(), &config, Arc::new(SmtpTransportFactory));
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    handle.await?;

    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}
