use anyhow::Context;
use ticketdb_app::{AppConfig, LoggingConfig, Services, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    let _log_guard = logging::init(LoggingConfig::from_settings(&config.logging))?;

    let services = match Services::start(&config).await {
        Ok(services) => services,
        Err(err) => {
            tracing::error!(error = ?err, "startup failed");
            return Err(err);
        }
    };

    tracing::info!("ready; press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    services.shutdown().await;
    Ok(())
}
