mod bootstrap;

use anyhow::Result;
use echobot_core::config::{AppConfig, LoadOptions};
use echobot_discord::gateway::GatewayError;

fn init_logging(config: &AppConfig) {
    use echobot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging depends on config, so config errors surface through `main` only
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config);

    tracing::info!(
        event_name = "system.bot.started",
        correlation_id = "bootstrap",
        max_retries = app.runner.reconnect_policy().max_retries,
        log_format = ?app.config.logging.format,
        "echobot started"
    );

    let outcome = tokio::select! {
        result = app.runner.start() => result.map_err(anyhow::Error::from),
        signal = wait_for_shutdown() => signal,
    };

    tracing::info!(
        event_name = "system.bot.stopping",
        correlation_id = "shutdown",
        "echobot stopping"
    );
    settle(outcome, app.runner.shutdown().await)
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// The runner's outcome wins; a failed disconnect is only logged.
fn settle(outcome: Result<()>, shutdown: Result<(), GatewayError>) -> Result<()> {
    if let Err(error) = shutdown {
        tracing::warn!(
            event_name = "system.bot.shutdown_failed",
            correlation_id = "shutdown",
            error = %error,
            "gateway transport did not close cleanly"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use echobot_discord::gateway::{GatewayError, TransportError};

    use super::settle;

    #[test]
    fn shutdown_failure_does_not_mask_the_runner_error() {
        let outcome = Err(GatewayError::Fatal(TransportError::Authentication(
            "discord rejected the bot token".to_owned(),
        ))
        .into());
        let shutdown = Err(GatewayError::Transport(TransportError::Disconnect("gone".to_owned())));

        let error = settle(outcome, shutdown).expect_err("runner error should surface");
        assert!(error.to_string().contains("failed permanently"), "got {error}");
    }

    #[test]
    fn shutdown_failure_after_clean_exit_is_not_an_error() {
        let shutdown = Err(GatewayError::Transport(TransportError::Disconnect("gone".to_owned())));
        assert!(settle(Ok(()), shutdown).is_ok());
    }
}
