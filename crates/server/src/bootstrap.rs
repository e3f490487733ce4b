use std::num::NonZeroU64;
use std::sync::Arc;

use secrecy::ExposeSecret;
use serenity::all::ApplicationId;
use serenity::Client;
use supportdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use supportdesk_db::{connect_with_settings, migrations, DbPool, SqlRegistrationRepository};
use supportdesk_discord::{intents, BotSettings, SupportHandler};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub handler: SupportHandler,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("discord client setup failed: {0}")]
    Discord(#[source] serenity::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connects and migrates the database and wires the bot. Nothing here talks
/// to Discord yet; the gateway session opens when the client starts.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = Arc::new(SqlRegistrationRepository::new(db_pool.clone()));
    let handler = SupportHandler::new(store, BotSettings::from(&config.support));
    info!(
        event_name = "system.bootstrap.bot_wired",
        correlation_id = "bootstrap",
        welcome_channel_configured = config.support.welcome_channel_id.is_some(),
        "support bot wired to event handler"
    );

    Ok(Application { config, db_pool, handler })
}

impl Application {
    /// Builds the serenity client; the gateway session opens on `start()`.
    pub async fn discord_client(&self) -> Result<Client, BootstrapError> {
        let application_id = self
            .config
            .discord
            .application_id
            .and_then(NonZeroU64::new)
            .map(ApplicationId::from)
            .ok_or_else(|| {
                ConfigError::Validation("discord.application_id must be a non-zero snowflake".to_owned())
            })?;

        Client::builder(self.config.discord.bot_token.expose_secret(), intents())
            .application_id(application_id)
            .event_handler(self.handler.clone())
            .await
            .map_err(BootstrapError::Discord)
    }
}

#[cfg(test)]
mod tests {
    use supportdesk_core::config::{ConfigOverrides, LoadOptions};
    use supportdesk_core::domain::ids::{ChannelId, GuildId, UserId};
    use supportdesk_core::domain::registration::RegistrationRecord;
    use supportdesk_db::SqlRegistrationRepository;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                discord_bot_token: Some("test-bot-token".to_string()),
                discord_application_id: Some(77),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                discord_bot_token: Some("Bot abc".to_string()),
                discord_application_id: Some(77),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let Err(error) = result else {
            panic!("bootstrap should reject a prefixed token");
        };
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("discord.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_exposes_registration_table() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'registered_users'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 1);

        let repository = SqlRegistrationRepository::new(app.db_pool.clone());
        repository
            .insert(&RegistrationRecord::new(UserId(1), GuildId(2), ChannelId(3)))
            .await
            .expect("insert after bootstrap");
        assert_eq!(repository.count().await.expect("count"), 1);
        assert_eq!(app.config.discord.application_id, Some(77));
        assert_eq!(
            app.handler.settings().register_prompt,
            "Welcome to the server, click this button to open a ticket!"
        );

        app.db_pool.close().await;
    }
}
