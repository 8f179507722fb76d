use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use echobot_core::{ChannelRef, InboundMessage};
use secrecy::{ExposeSecret, SecretString};
use serenity::{
    all::{Channel, ChannelId, GatewayIntents, Message, Ready},
    client::{Client, Context, EventHandler as SerenityEventHandler},
    gateway::{GatewayError as SerenityGatewayError, ShardManager},
    http::Http,
};
use tokio::{
    sync::{mpsc, Mutex},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, info, warn};

use crate::{
    channels::{ChannelError, ChannelKind, MessageChannels, ResolvedChannel},
    events::{DiscordEvent, GatewayEnvelope, ReadyEvent},
    gateway::{GatewayTransport, TransportError},
};

/// Intents the echo command needs: guild and direct messages, with content.
pub fn default_intents() -> GatewayIntents {
    GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Gateway transport backed by a serenity [`Client`].
///
/// Serenity owns the websocket, heartbeats, resumes and shard lifecycle. Its
/// callbacks are turned into [`GatewayEnvelope`]s and queued for the runner.
pub struct SerenityTransport {
    token: SecretString,
    intents: GatewayIntents,
    event_buffer: usize,
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct ConnectionState {
    receiver: Option<mpsc::Receiver<GatewayEnvelope>>,
    client_task: Option<JoinHandle<Result<(), serenity::Error>>>,
    shard_manager: Option<Arc<ShardManager>>,
}

impl SerenityTransport {
    pub fn new(token: SecretString, intents: GatewayIntents, event_buffer: usize) -> Self {
        Self { token, intents, event_buffer: event_buffer.max(1), state: Mutex::default() }
    }
}

#[async_trait]
impl GatewayTransport for SerenityTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        let (sender, receiver) = mpsc::channel(self.event_buffer);

        let mut client = Client::builder(self.token.expose_secret(), self.intents)
            .event_handler(ForwardingHandler { sender })
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        state.shard_manager = Some(client.shard_manager.clone());
        state.receiver = Some(receiver);
        state.client_task = Some(tokio::spawn(async move { client.start().await }));

        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        let mut state = self.state.lock().await;
        let ConnectionState { receiver: Some(receiver), client_task: Some(client_task), .. } =
            &mut *state
        else {
            return Err(TransportError::Receive("transport is not connected".to_owned()));
        };

        let finished = match next_connection_event(receiver, client_task).await {
            ConnectionEvent::Envelope(envelope) => return Ok(Some(envelope)),
            ConnectionEvent::Finished(finished) => finished,
        };

        // Serenity leaves the shard queuer running when `start` returns an
        // error, and the queuer owns the forwarding handler, so the queue
        // stays open until the manager is shut down.
        state.receiver = None;
        state.client_task = None;
        if let Some(shard_manager) = state.shard_manager.take() {
            shard_manager.shutdown_all().await;
        }

        match finished {
            Ok(Ok(())) => Ok(None),
            Ok(Err(error)) => Err(classify_client_error(error)),
            Err(join_error) => Err(TransportError::Receive(join_error.to_string())),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if let Some(shard_manager) = state.shard_manager.take() {
            shard_manager.shutdown_all().await;
        }
        state.receiver = None;
        if let Some(client_task) = state.client_task.take() {
            client_task.abort();
        }
        Ok(())
    }
}

type ClientTaskResult = Result<Result<(), serenity::Error>, JoinError>;

enum ConnectionEvent {
    Envelope(GatewayEnvelope),
    Finished(ClientTaskResult),
}

/// Waits for the next queued envelope or for the client task to end.
///
/// Envelopes already in the queue win over a finished task.
async fn next_connection_event<F>(
    receiver: &mut mpsc::Receiver<GatewayEnvelope>,
    client_task: &mut F,
) -> ConnectionEvent
where
    F: Future<Output = ClientTaskResult> + Unpin,
{
    tokio::select! {
        biased;
        Some(envelope) = receiver.recv() => ConnectionEvent::Envelope(envelope),
        finished = client_task => ConnectionEvent::Finished(finished),
    }
}

fn classify_client_error(error: serenity::Error) -> TransportError {
    match error {
        serenity::Error::Gateway(SerenityGatewayError::InvalidAuthentication) => {
            TransportError::Authentication("discord rejected the bot token".to_owned())
        }
        serenity::Error::Gateway(
            gateway_error @ (SerenityGatewayError::InvalidGatewayIntents
            | SerenityGatewayError::DisallowedGatewayIntents),
        ) => TransportError::Authentication(format!(
            "{gateway_error} (enable the Message Content intent in the developer portal)"
        )),
        other => TransportError::Receive(other.to_string()),
    }
}

struct ForwardingHandler {
    sender: mpsc::Sender<GatewayEnvelope>,
}

impl ForwardingHandler {
    async fn forward(&self, envelope: GatewayEnvelope) {
        if self.sender.send(envelope).await.is_err() {
            debug!("gateway queue closed; dropping event");
        }
    }
}

#[serenity::async_trait]
impl SerenityEventHandler for ForwardingHandler {
    async fn message(&self, _ctx: Context, message: Message) {
        self.forward(message_envelope(&message)).await;
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.forward(ready_envelope(&ready)).await;
    }
}

pub fn inbound_message(message: &Message) -> InboundMessage {
    InboundMessage {
        id: message.id.to_string(),
        channel: ChannelRef(message.channel_id.to_string()),
        author_id: message.author.id.to_string(),
        content: (!message.content.is_empty()).then(|| message.content.clone()),
    }
}

fn message_envelope(message: &Message) -> GatewayEnvelope {
    GatewayEnvelope {
        envelope_id: message.id.to_string(),
        event: DiscordEvent::MessageCreate(inbound_message(message)),
    }
}

fn ready_envelope(ready: &Ready) -> GatewayEnvelope {
    GatewayEnvelope {
        envelope_id: format!("ready-{}", ready.session_id),
        event: DiscordEvent::Ready(ReadyEvent {
            user_id: ready.user.id.to_string(),
            user_name: ready.user.name.clone(),
            guild_count: ready.guilds.len(),
        }),
    }
}

/// REST-backed channels: one channel lookup, then one create-message call.
#[derive(Clone)]
pub struct SerenityChannels {
    http: Arc<Http>,
}

impl SerenityChannels {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    pub fn from_token(token: &SecretString) -> Self {
        Self::new(Arc::new(Http::new(token.expose_secret())))
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }
}

#[async_trait]
impl MessageChannels for SerenityChannels {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ResolvedChannel, ChannelError> {
        let channel_id = parse_channel_id(channel)?;
        let resolved = channel_id.to_channel(self.http.as_ref()).await.map_err(|error| {
            ChannelError::Resolve { channel: channel.0.clone(), reason: error.to_string() }
        })?;

        let kind = match &resolved {
            Channel::Guild(_) => ChannelKind::Guild,
            Channel::Private(_) => ChannelKind::Private,
            _ => ChannelKind::Other,
        };

        Ok(ResolvedChannel { id: ChannelRef(resolved.id().to_string()), kind })
    }

    async fn send_message(
        &self,
        channel: &ResolvedChannel,
        text: &str,
    ) -> Result<String, ChannelError> {
        let channel_id = parse_channel_id(&channel.id)?;
        let sent = channel_id.say(&self.http, text).await.map_err(|error| {
            warn!(channel_id = %channel.id, error = %error, "discord rejected outbound message");
            ChannelError::Send { channel: channel.id.0.clone(), reason: error.to_string() }
        })?;

        info!(
            event_name = "egress.discord.message_created",
            channel_id = %channel.id,
            message_id = %sent.id,
            "discord message created"
        );
        Ok(sent.id.to_string())
    }
}

/// Discord snowflakes are non-zero 64-bit integers.
pub fn parse_channel_id(channel: &ChannelRef) -> Result<ChannelId, ChannelError> {
    match channel.0.trim().parse::<u64>() {
        Ok(raw) if raw != 0 => Ok(ChannelId::new(raw)),
        _ => Err(ChannelError::InvalidReference(channel.0.clone())),
    }
}
