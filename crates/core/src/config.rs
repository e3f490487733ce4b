use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "supportdesk.toml";
pub const MAX_ROLE_COLOR: u32 = 0xFF_FFFF;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub support: SupportConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub application_id: Option<u64>,
}

/// Names and texts the bot uses inside each guild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupportConfig {
    pub staff_role: String,
    pub member_role: String,
    pub member_role_color: u32,
    pub ticket_category: String,
    pub register_prompt: String,
    pub ticket_welcome_message: String,
    pub welcome_channel_id: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub discord_bot_token: Option<String>,
    pub discord_application_id: Option<u64>,
    pub welcome_channel_id: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            staff_role: "Support Staff".to_string(),
            member_role: "Student".to_string(),
            member_role_color: 0x4499d5,
            ticket_category: "tickets".to_string(),
            register_prompt: "Welcome to the server, click this button to open a ticket!"
                .to_string(),
            ticket_welcome_message:
                "Welcome to your support channel! Describe your question here and a staff member will get back to you."
                    .to_string(),
            welcome_channel_id: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://supportdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            discord: DiscordConfig {
                bot_token: String::new().into(),
                application_id: None,
            },
            support: SupportConfig::default(),
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(discord) = patch.discord {
            if let Some(bot_token) = discord.bot_token {
                self.discord.bot_token = bot_token.into();
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = Some(application_id);
            }
        }

        if let Some(support) = patch.support {
            if let Some(staff_role) = support.staff_role {
                self.support.staff_role = staff_role;
            }
            if let Some(member_role) = support.member_role {
                self.support.member_role = member_role;
            }
            if let Some(member_role_color) = support.member_role_color {
                self.support.member_role_color = member_role_color;
            }
            if let Some(ticket_category) = support.ticket_category {
                self.support.ticket_category = ticket_category;
            }
            if let Some(register_prompt) = support.register_prompt {
                self.support.register_prompt = register_prompt;
            }
            if let Some(ticket_welcome_message) = support.ticket_welcome_message {
                self.support.ticket_welcome_message = ticket_welcome_message;
            }
            if let Some(welcome_channel_id) = support.welcome_channel_id {
                self.support.welcome_channel_id = Some(welcome_channel_id);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SUPPORTDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SUPPORTDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SUPPORTDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SUPPORTDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SUPPORTDESK_DISCORD_BOT_TOKEN") {
            self.discord.bot_token = value.into();
        }
        if let Some(value) = read_env("SUPPORTDESK_DISCORD_APPLICATION_ID") {
            self.discord.application_id =
                Some(parse_u64("SUPPORTDESK_DISCORD_APPLICATION_ID", &value)?);
        }

        if let Some(value) = read_env("SUPPORTDESK_STAFF_ROLE") {
            self.support.staff_role = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_MEMBER_ROLE") {
            self.support.member_role = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_MEMBER_ROLE_COLOR") {
            self.support.member_role_color = parse_color("SUPPORTDESK_MEMBER_ROLE_COLOR", &value)?;
        }
        if let Some(value) = read_env("SUPPORTDESK_TICKET_CATEGORY") {
            self.support.ticket_category = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_REGISTER_PROMPT") {
            self.support.register_prompt = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_TICKET_WELCOME_MESSAGE") {
            self.support.ticket_welcome_message = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_WELCOME_CHANNEL_ID") {
            self.support.welcome_channel_id =
                Some(parse_u64("SUPPORTDESK_WELCOME_CHANNEL_ID", &value)?);
        }

        if let Some(value) = read_env("SUPPORTDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SUPPORTDESK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("SUPPORTDESK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("SUPPORTDESK_LOGGING_LEVEL").or_else(|| read_env("SUPPORTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SUPPORTDESK_LOGGING_FORMAT").or_else(|| read_env("SUPPORTDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = bot_token.into();
        }
        if let Some(application_id) = overrides.discord_application_id {
            self.discord.application_id = Some(application_id);
        }
        if let Some(welcome_channel_id) = overrides.welcome_channel_id {
            self.support.welcome_channel_id = Some(welcome_channel_id);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_discord(&self.discord)?;
        validate_support(&self.support)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let bot_token = discord.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token".to_string(),
        ));
    }
    if bot_token.starts_with("Bot ") {
        return Err(ConfigError::Validation(
            "discord.bot_token must be the raw token without the `Bot ` prefix".to_string(),
        ));
    }

    if discord.application_id.is_none() {
        return Err(ConfigError::Validation(
            "discord.application_id is required. Find it under General Information of your application".to_string(),
        ));
    }

    Ok(())
}

fn validate_support(support: &SupportConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("support.staff_role", &support.staff_role),
        ("support.member_role", &support.member_role),
        ("support.ticket_category", &support.ticket_category),
        ("support.register_prompt", &support.register_prompt),
        ("support.ticket_welcome_message", &support.ticket_welcome_message),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }

    if support.member_role_color > MAX_ROLE_COLOR {
        return Err(ConfigError::Validation(format!(
            "support.member_role_color must be at most {MAX_ROLE_COLOR:#08x}"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

/// Decimal or `0x`-prefixed hex.
fn parse_color(key: &str, value: &str) -> Result<u32, ConfigError> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    };
    parsed.map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    discord: Option<DiscordPatch>,
    support: Option<SupportPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    application_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SupportPatch {
    staff_role: Option<String>,
    member_role: Option<String>,
    member_role_color: Option<u32>,
    ticket_category: Option<String>,
    register_prompt: Option<String>,
    ticket_welcome_message: Option<String>,
    welcome_channel_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
