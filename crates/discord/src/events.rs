use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use echobot_core::{echo_reply, InboundMessage, OutboundMessage};
use thiserror::Error;
use tracing::{debug, info};

use crate::channels::{ChannelError, MessageChannels};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub event: DiscordEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscordEvent {
    MessageCreate(InboundMessage),
    Ready(ReadyEvent),
    Unsupported { event_type: String },
}

impl DiscordEvent {
    pub fn event_type(&self) -> DiscordEventType {
        match self {
            Self::MessageCreate(_) => DiscordEventType::MessageCreate,
            Self::Ready(_) => DiscordEventType::Ready,
            Self::Unsupported { .. } => DiscordEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscordEventType {
    MessageCreate,
    Ready,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyEvent {
    pub user_id: String,
    pub user_name: String,
    pub guild_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> DiscordEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<DiscordEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher<C>(channels: C) -> EventDispatcher
where
    C: MessageChannels + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageCreateHandler::new(channels));
    dispatcher.register(ReadyHandler);
    dispatcher
}

/// Answers `!echo` messages in the channel they were posted in.
pub struct MessageCreateHandler<C> {
    channels: C,
}

impl<C> MessageCreateHandler<C>
where
    C: MessageChannels,
{
    pub fn new(channels: C) -> Self {
        Self { channels }
    }
}

#[async_trait]
impl<C> EventHandler for MessageCreateHandler<C>
where
    C: MessageChannels + 'static,
{
    fn event_type(&self) -> DiscordEventType {
        DiscordEventType::MessageCreate
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let DiscordEvent::MessageCreate(message) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let Some(reply) = echo_reply(message) else {
            return Ok(HandlerResult::Ignored);
        };

        debug!(
            event_name = "command.echo.matched",
            correlation_id = %ctx.correlation_id,
            channel_id = %reply.channel,
            author_id = %message.author_id,
            "echo command matched"
        );

        let channel = self.channels.resolve_channel(&reply.channel).await?;
        let delivered_id = self.channels.send_message(&channel, &reply.text).await?;

        info!(
            event_name = "egress.discord.reply_sent",
            correlation_id = %ctx.correlation_id,
            channel_id = %channel.id,
            message_id = %delivered_id,
            "echo reply delivered"
        );

        Ok(HandlerResult::Replied(reply))
    }
}

pub struct ReadyHandler;

#[async_trait]
impl EventHandler for ReadyHandler {
    fn event_type(&self) -> DiscordEventType {
        DiscordEventType::Ready
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let DiscordEvent::Ready(ready) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "ingress.discord.ready",
            correlation_id = %ctx.correlation_id,
            user_id = %ready.user_id,
            user_name = %ready.user_name,
            guild_count = ready.guild_count,
            "connected to discord gateway"
        );

        Ok(HandlerResult::Processed)
    }
}
