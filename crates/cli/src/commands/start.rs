use crate::commands::CommandResult;
use echobot_core::config::{AppConfig, LoadOptions};
use echobot_discord::client::default_intents;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "start",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    CommandResult::success(
        "start",
        format!(
            "preflight passed (intents: {:?}, max_retries: {}, event_buffer: {}); run `echobot-bot` to connect",
            default_intents(),
            config.gateway.max_retries,
            config.gateway.event_buffer
        ),
    )
}
