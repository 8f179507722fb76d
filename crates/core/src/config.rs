use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "echobot.toml";
pub const NESTED_CONFIG_FILE: &str = "config/echobot.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub event_buffer: usize,
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
    pub discord_token: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub gateway_max_retries: Option<u32>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig { token: String::new().into() },
            gateway: GatewayConfig {
                max_retries: 5,
                base_delay_ms: 250,
                max_delay_ms: 5_000,
                event_buffer: 256,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
        if let Some(discord) = patch.discord {
            if let Some(token) = discord.token {
                self.discord.token = secret_value(token);
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(max_retries) = gateway.max_retries {
                self.gateway.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = gateway.base_delay_ms {
                self.gateway.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = gateway.max_delay_ms {
                self.gateway.max_delay_ms = max_delay_ms;
            }
            if let Some(event_buffer) = gateway.event_buffer {
                self.gateway.event_buffer = event_buffer;
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
        let token = read_env("ECHOBOT_DISCORD_TOKEN").or_else(|| read_env("DISCORD_TOKEN"));
        if let Some(value) = token {
            self.discord.token = secret_value(value);
        }

        if let Some(value) = read_env("ECHOBOT_GATEWAY_MAX_RETRIES") {
            self.gateway.max_retries = parse_u32("ECHOBOT_GATEWAY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("ECHOBOT_GATEWAY_BASE_DELAY_MS") {
            self.gateway.base_delay_ms = parse_u64("ECHOBOT_GATEWAY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("ECHOBOT_GATEWAY_MAX_DELAY_MS") {
            self.gateway.max_delay_ms = parse_u64("ECHOBOT_GATEWAY_MAX_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("ECHOBOT_GATEWAY_EVENT_BUFFER") {
            self.gateway.event_buffer = parse_usize("ECHOBOT_GATEWAY_EVENT_BUFFER", &value)?;
        }

        let log_level =
            read_env("ECHOBOT_LOGGING_LEVEL").or_else(|| read_env("ECHOBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ECHOBOT_LOGGING_FORMAT").or_else(|| read_env("ECHOBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(max_retries) = overrides.gateway_max_retries {
            self.gateway.max_retries = max_retries;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_gateway(&self.gateway)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
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

/// Checks the shape of a bot token without contacting Discord.
///
/// Bot tokens are three base64url segments joined by dots. The `Bot ` scheme
/// prefix is added by the HTTP client and must not be part of the value.
pub fn validate_token_format(token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Reset Token".to_string(),
        ));
    }

    if token.starts_with("Bot ") || token.starts_with("Bearer ") {
        return Err(ConfigError::Validation(
            "discord.token must be the raw token (hint: drop the `Bot ` prefix, it is added automatically)"
                .to_string(),
        ));
    }

    if token.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "discord.token must not contain whitespace".to_string(),
        ));
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|segment| segment.is_empty()) {
        let hint = if segments.len() == 1 {
            " (hint: you may have used the client secret or public key instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "discord.token must have three dot-separated segments{hint}"
        )));
    }

    Ok(())
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    validate_token_format(discord.token.expose_secret())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.max_retries > 100 {
        return Err(ConfigError::Validation(
            "gateway.max_retries must be in range 0..=100".to_string(),
        ));
    }

    if gateway.max_delay_ms < gateway.base_delay_ms {
        return Err(ConfigError::Validation(
            "gateway.max_delay_ms must be greater than or equal to gateway.base_delay_ms"
                .to_string(),
        ));
    }

    if gateway.event_buffer == 0 || gateway.event_buffer > 65_536 {
        return Err(ConfigError::Validation(
            "gateway.event_buffer must be in range 1..=65536".to_string(),
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

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    gateway: Option<GatewayPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    event_buffer: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
