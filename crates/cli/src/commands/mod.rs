pub mod config;
pub mod doctor;
pub mod lookup;
pub mod migrate;

use serde::Serialize;
use serde_json::Value;

use supportdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use supportdesk_db::{connect_with_settings, DbPool};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Failure of a command step, already classified for [`CommandResult::failure`].
pub(crate) struct StepFailure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl StepFailure {
    pub(crate) fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

pub(crate) fn load_config() -> Result<AppConfig, StepFailure> {
    AppConfig::load(LoadOptions::default()).map_err(|error: ConfigError| StepFailure {
        error_class: "config_validation",
        message: format!("configuration issue: {error}"),
        exit_code: EXIT_CONFIG,
    })
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, StepFailure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        StepFailure {
            error_class: "runtime_init",
            message: format!("failed to initialize async runtime: {error}"),
            exit_code: EXIT_RUNTIME,
        }
    })
}

pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, StepFailure> {
    connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| StepFailure {
        error_class: "db_connectivity",
        message: format!("failed to connect to database: {error}"),
        exit_code: EXIT_DATABASE,
    })
}
