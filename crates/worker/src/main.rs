use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainpulse_db::metrics::NullMetricsStore;
use chainpulse_notify::delivery::{
    EmailTransport, FcmClient, FcmConfig, PushClient, SmtpConfig, SmtpMailer,
};
use chainpulse_notify::{NotificationCollector, NotificationSender, NotifyConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chainpulse_worker=debug,chainpulse_notify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = NotifyConfig::from_env();
    tracing::info!(?config, "Loaded notification configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = chainpulse_db::create_pool(&database_url).await?;
    chainpulse_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");
    chainpulse_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Delivery collaborators ---
    let email: Option<Arc<dyn EmailTransport>> = match SmtpConfig::from_env() {
        Some(config) => Some(Arc::new(SmtpMailer::new(config))),
        None => {
            tracing::warn!("SMTP_HOST not set, email delivery disabled");
            None
        }
    };
    let push: Option<Arc<dyn PushClient>> = match FcmConfig::from_env() {
        Some(config) => Some(Arc::new(FcmClient::new(config))),
        None => {
            tracing::warn!("FCM_SERVER_KEY not set, push delivery disabled");
            None
        }
    };

    // --- Pipeline loops ---
    let cancel = CancellationToken::new();

    let collector = NotificationCollector::new(
        pool.clone(),
        config.clone(),
        Arc::new(NullMetricsStore),
    );
    let collector_handle = tokio::spawn(collector.run(cancel.clone()));

    let sender = NotificationSender::new(pool.clone(), config, email, push);
    let sender_handle = tokio::spawn(sender.run(cancel.clone()));

    tracing::info!("Notification collector and sender started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    let _ = collector_handle.await;
    let _ = sender_handle.await;
    tracing::info!("Worker stopped");
    Ok(())
}
