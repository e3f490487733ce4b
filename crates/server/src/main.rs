mod bootstrap;
mod health;

use anyhow::Result;
use supportdesk_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use supportdesk_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let mut client = app.discord_client().await?;
    let shard_manager = client.shard_manager.clone();

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "supportdesk bot started"
    );

    // Slash commands are registered from the ready handler once the session is up.
    tokio::select! {
        result = client.start() => {
            result?;
            tracing::info!(
                event_name = "system.server.gateway_closed",
                correlation_id = "shutdown",
                "gateway session closed"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "supportdesk bot stopping"
            );
            shard_manager.shutdown_all().await;
        }
    }

    app.db_pool.close().await;
    Ok(())
}
