use std::sync::Arc;

use echobot_core::config::AppConfig;
use echobot_discord::{
    client::{default_intents, SerenityChannels, SerenityTransport},
    events::default_dispatcher,
    gateway::{GatewayRunner, ReconnectPolicy},
};
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runner: GatewayRunner,
}

/// Wires the serenity transport and REST channels into a gateway runner.
/// Nothing here touches the network; the first connection happens on start.
pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let channels = SerenityChannels::from_token(&config.discord.token);
    let transport = SerenityTransport::new(
        config.discord.token.clone(),
        default_intents(),
        config.gateway.event_buffer,
    );
    let runner = GatewayRunner::new(
        Arc::new(transport),
        default_dispatcher(channels),
        ReconnectPolicy::from(&config.gateway),
    );

    info!(
        event_name = "system.bootstrap.runner_ready",
        correlation_id = "bootstrap",
        event_buffer = config.gateway.event_buffer,
        "gateway runner initialized"
    );

    Application { config, runner }
}

#[cfg(test)]
mod tests {
    use echobot_core::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
    use echobot_discord::gateway::ReconnectPolicy;

    use crate::bootstrap::{bootstrap_with_config, Application};

    const TOKEN: &str = "MTEwMDAwMDAwMDAwMDAwMDAx.GbOot1.Ym9vdHN0cmFwLXRva2Vu";

    fn bootstrap(options: LoadOptions) -> Result<Application, ConfigError> {
        AppConfig::load(options).map(bootstrap_with_config)
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_malformed_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                discord_token: Some("Bot not-a-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("discord.token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_runner_from_config() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                discord_token: Some(TOKEN.to_string()),
                gateway_max_retries: Some(7),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with a well-formed token");

        assert_eq!(app.config.gateway.max_retries, 7);
        assert_eq!(app.runner.reconnect_policy(), &ReconnectPolicy::from(&app.config.gateway));
    }
}
