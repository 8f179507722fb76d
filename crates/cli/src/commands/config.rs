use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use echobot_core::config::{
    AppConfig, LoadOptions, LogFormat, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE,
};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: [(&str, String, &[&str]); 7] = [
        (
            "discord.token",
            redact_token(config.discord.token.expose_secret()),
            &["ECHOBOT_DISCORD_TOKEN", "DISCORD_TOKEN"],
        ),
        (
            "gateway.max_retries",
            config.gateway.max_retries.to_string(),
            &["ECHOBOT_GATEWAY_MAX_RETRIES"],
        ),
        (
            "gateway.base_delay_ms",
            config.gateway.base_delay_ms.to_string(),
            &["ECHOBOT_GATEWAY_BASE_DELAY_MS"],
        ),
        (
            "gateway.max_delay_ms",
            config.gateway.max_delay_ms.to_string(),
            &["ECHOBOT_GATEWAY_MAX_DELAY_MS"],
        ),
        (
            "gateway.event_buffer",
            config.gateway.event_buffer.to_string(),
            &["ECHOBOT_GATEWAY_EVENT_BUFFER"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["ECHOBOT_LOGGING_LEVEL", "ECHOBOT_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format_name(config.logging.format).to_string(),
            &["ECHOBOT_LOGGING_FORMAT", "ECHOBOT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in &fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    // Aliases are checked in the same order the loader applies them.
    let env_hit = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_hit {
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

fn format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn redact_token(token: &str) -> String {
    if token.trim().is_empty() {
        return "<empty>".to_string();
    }
    "<redacted>".to_string()
}
