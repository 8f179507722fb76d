use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use echobot_core::config::GatewayConfig;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{DiscordEvent, EventContext, EventDispatcher, GatewayEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("gateway rejected the bot token: {0}")]
    Authentication(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

impl TransportError {
    /// Failures that no amount of reconnecting will fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway connection failed permanently: {0}")]
    Fatal(#[source] TransportError),
    #[error("gateway reconnect attempts exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl From<&GatewayConfig> for ReconnectPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the connection closed cleanly.
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

/// A connection that ended in a transport error.
struct PumpFailure {
    error: TransportError,
    delivered: u64,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.reconnect_policy
    }

    /// Runs until the transport closes cleanly or fails for good.
    ///
    /// The retry counter starts over whenever a connection manages to deliver
    /// at least one envelope before dropping.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let mut attempt: u32 = 0;

        loop {
            let failure = match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(failure) => failure,
            };

            if failure.error.is_fatal() {
                error!(
                    event_name = "system.gateway.fatal",
                    attempt,
                    error = %failure.error,
                    "gateway transport failed permanently"
                );
                return Err(GatewayError::Fatal(failure.error));
            }

            if failure.delivered > 0 {
                attempt = 0;
            }

            warn!(
                event_name = "system.gateway.transport_failed",
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                delivered = failure.delivered,
                error = %failure.error,
                "gateway transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                error!(
                    event_name = "system.gateway.retries_exhausted",
                    max_retries = self.reconnect_policy.max_retries,
                    "gateway reconnect attempts exhausted"
                );
                return Err(GatewayError::RetriesExhausted {
                    attempts: attempt + 1,
                    last_error: failure.error,
                });
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        info!(event_name = "system.gateway.shutdown", "closing gateway transport");
        self.transport.disconnect().await.map_err(GatewayError::from)
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), PumpFailure> {
        let mut delivered = 0_u64;
        let fail = |error: TransportError, delivered: u64| PumpFailure { error, delivered };

        info!(attempt, "opening discord gateway connection");
        self.transport.connect().await.map_err(|error| fail(error, delivered))?;
        info!(attempt, "discord gateway transport connected");

        loop {
            let next =
                self.transport.next_envelope().await.map_err(|error| fail(error, delivered))?;
            let Some(envelope) = next else {
                info!(attempt, "discord gateway stream closed");
                self.transport.disconnect().await.map_err(|error| fail(error, delivered))?;
                return Ok(());
            };
            delivered += 1;
            let channel_id = channel_field(&envelope);

            debug!(
                event_name = "ingress.discord.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                "received discord envelope"
            );

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            if let Err(error) = self.dispatcher.dispatch(&envelope, &context).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id = channel_id.unwrap_or("unknown"),
                    error = %error,
                    "event dispatch failed; continuing gateway loop"
                );
            }
        }
    }
}

fn channel_field(envelope: &GatewayEnvelope) -> Option<&str> {
    match &envelope.event {
        DiscordEvent::MessageCreate(message) => Some(message.channel.0.as_str()),
        DiscordEvent::Ready(_) | DiscordEvent::Unsupported { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use echobot_core::{ChannelRef, InboundMessage};
    use tokio::sync::Mutex;

    use super::{GatewayError, GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
    use crate::channels::{testing::RecordingChannels, ChannelError};
    use crate::events::{default_dispatcher, DiscordEvent, EventDispatcher, GatewayEnvelope};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<GatewayEnvelope>, TransportError>>,
        connect_attempts: usize,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<GatewayEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    connect_attempts: 0,
                    disconnect_calls: 0,
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    fn echo_envelope(id: &str, channel: &str, content: &str) -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: id.to_owned(),
            event: DiscordEvent::MessageCreate(InboundMessage {
                id: id.to_owned(),
                channel: ChannelRef(channel.to_owned()),
                author_id: "1000000000000000001".to_owned(),
                content: Some(content.to_owned()),
            }),
        }
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn pumps_messages_into_echo_replies() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(echo_envelope("m-1", "C-1", "!echo one"))),
                Ok(Some(echo_envelope("m-2", "C-2", "not a command"))),
                Ok(Some(echo_envelope("m-3", "C-3", "!echothree"))),
                Ok(None),
            ],
        ));
        let channels = Arc::new(RecordingChannels::default());

        let runner = GatewayRunner::new(
            transport.clone(),
            default_dispatcher(channels.clone()),
            no_delay(0),
        );

        runner.start().await.expect("clean close should end the runner");

        assert_eq!(
            channels.sent().await,
            vec![
                (ChannelRef("C-1".to_owned()), "Hello! You said one".to_owned()),
                (ChannelRef("C-3".to_owned()), "Hello! You said three".to_owned()),
            ]
        );
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn send_failure_does_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(echo_envelope("m-1", "C-1", "!echo lost"))),
                Ok(Some(echo_envelope("m-2", "C-1", "!echo kept"))),
                Ok(None),
            ],
        ));
        let channels = Arc::new(RecordingChannels::default());
        channels
            .fail_next_send(ChannelError::Send {
                channel: "C-1".to_owned(),
                reason: "Missing Permissions".to_owned(),
            })
            .await;

        let runner = GatewayRunner::new(
            transport.clone(),
            default_dispatcher(channels.clone()),
            no_delay(0),
        );

        runner.start().await.expect("dispatch failures should not end the runner");

        assert_eq!(
            channels.sent().await,
            vec![(ChannelRef("C-1".to_owned()), "Hello! You said kept".to_owned())]
        );
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(GatewayEnvelope {
                    envelope_id: "env-1".to_owned(),
                    event: DiscordEvent::Unsupported { event_type: "TYPING_START".to_owned() },
                })),
                Ok(None),
            ],
        ));

        let runner = GatewayRunner::new(transport.clone(), EventDispatcher::default(), no_delay(2));

        runner.start().await.expect("runner should recover");

        assert_eq!(transport.connect_attempts().await, 2);
    }

    #[tokio::test]
    async fn exhausting_retries_is_fatal() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = GatewayRunner::new(transport.clone(), EventDispatcher::default(), no_delay(2));

        let error = runner.start().await.expect_err("retries should run out");
        assert!(matches!(
            error,
            GatewayError::RetriesExhausted {
                attempts: 3,
                last_error: TransportError::Connect(ref message),
            } if message == "fail-3"
        ));
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn authentication_failure_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Authentication("4004".to_owned()))],
            vec![],
        ));

        let runner = GatewayRunner::new(transport.clone(), EventDispatcher::default(), no_delay(5));

        let error = runner.start().await.expect_err("bad token should stop the runner");
        assert!(matches!(error, GatewayError::Fatal(TransportError::Authentication(_))));
        assert_eq!(transport.connect_attempts().await, 1);
    }

    #[tokio::test]
    async fn delivered_envelopes_reset_the_retry_budget() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(()), Ok(())],
            vec![
                Ok(Some(echo_envelope("m-1", "C-1", "!echo a"))),
                Err(TransportError::Receive("reset by peer".to_owned())),
                Ok(Some(echo_envelope("m-2", "C-1", "!echo b"))),
                Err(TransportError::Receive("reset by peer".to_owned())),
                Ok(None),
            ],
        ));
        let channels = Arc::new(RecordingChannels::default());

        let runner = GatewayRunner::new(
            transport.clone(),
            default_dispatcher(channels.clone()),
            no_delay(1),
        );

        runner.start().await.expect("each drop followed progress, so the budget is never spent");

        assert_eq!(transport.connect_attempts().await, 3);
        assert_eq!(channels.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_disconnects_transport() {
        let transport = Arc::new(ScriptedTransport::default());
        let runner = GatewayRunner::new(transport.clone(), EventDispatcher::default(), no_delay(0));

        runner.shutdown().await.expect("shutdown");

        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 250, max_delay_ms: 1_000 };

        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(2).as_millis(), 1_000);
        assert_eq!(policy.backoff(9).as_millis(), 1_000);
    }

    #[test]
    fn transport_error_fatality() {
        assert!(TransportError::Authentication("bad token".to_owned()).is_fatal());
        assert!(!TransportError::Connect("dns".to_owned()).is_fatal());
        assert!(!TransportError::Receive("closed".to_owned()).is_fatal());
    }
}
