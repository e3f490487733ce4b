use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use supportdesk_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let optional = |value: Option<u64>| value.map_or_else(|| "<unset>".to_string(), |id| id.to_string());
    let field = |key, env_key, value: String| Field { key, env_key, value };

    vec![
        field("database.url", "SUPPORTDESK_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "SUPPORTDESK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "SUPPORTDESK_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "discord.bot_token",
            "SUPPORTDESK_DISCORD_BOT_TOKEN",
            redact_token(config.discord.bot_token.expose_secret()),
        ),
        field(
            "discord.application_id",
            "SUPPORTDESK_DISCORD_APPLICATION_ID",
            optional(config.discord.application_id),
        ),
        field("support.staff_role", "SUPPORTDESK_STAFF_ROLE", config.support.staff_role.clone()),
        field("support.member_role", "SUPPORTDESK_MEMBER_ROLE", config.support.member_role.clone()),
        field(
            "support.member_role_color",
            "SUPPORTDESK_MEMBER_ROLE_COLOR",
            format!("{:#08x}", config.support.member_role_color),
        ),
        field(
            "support.ticket_category",
            "SUPPORTDESK_TICKET_CATEGORY",
            config.support.ticket_category.clone(),
        ),
        field(
            "support.register_prompt",
            "SUPPORTDESK_REGISTER_PROMPT",
            config.support.register_prompt.clone(),
        ),
        field(
            "support.ticket_welcome_message",
            "SUPPORTDESK_TICKET_WELCOME_MESSAGE",
            config.support.ticket_welcome_message.clone(),
        ),
        field(
            "support.welcome_channel_id",
            "SUPPORTDESK_WELCOME_CHANNEL_ID",
            optional(config.support.welcome_channel_id),
        ),
        field(
            "server.bind_address",
            "SUPPORTDESK_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field(
            "server.health_check_port",
            "SUPPORTDESK_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        field("logging.level", "SUPPORTDESK_LOGGING_LEVEL", config.logging.level.clone()),
        field(
            "logging.format",
            "SUPPORTDESK_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Bot tokens are `<base64 user id>.<timestamp>.<hmac>`; only the id part is shown.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('.') {
        Some((user_part, _)) if !user_part.is_empty() => format!("{user_part}.***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_user_segment() {
        assert_eq!(redact_token("MTIzNDU2.GhIjKl.secret-part"), "MTIzNDU2.***");
        assert_eq!(redact_token("no-dots-here"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn detects_nested_keys_in_config_file() {
        let doc: toml::Value =
            "[support]\nstaff_role = \"Helpers\"\n".parse().expect("toml should parse");
        assert!(contains_path(&doc, "support.staff_role"));
        assert!(!contains_path(&doc, "support.member_role"));
    }
}
