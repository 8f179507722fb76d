//! Discord Integration - gateway bot interface
//!
//! This crate connects the echo command to Discord:
//! - **Gateway** (`gateway`) - connection loop with reconnection and backoff
//! - **Client** (`client`) - serenity-backed transport and REST channels
//! - **Events** (`events`) - routes gateway events to handlers
//! - **Channels** (`channels`) - channel lookup and message delivery seam
//!
//! # Getting Started
//!
//! 1. Create an application at https://discord.com/developers/applications
//! 2. Add a bot user and enable the **Message Content** privileged intent
//! 3. Invite the bot with the `Send Messages` and `Read Message History` permissions
//! 4. Set `ECHOBOT_DISCORD_TOKEN` (or `DISCORD_TOKEN`)
//!
//! # Architecture
//!
//! ```text
//! serenity callbacks → mpsc queue → GatewayRunner → EventDispatcher → Handlers
//!                                                                  ↓
//!                                         MessageChannels (resolve, then send)
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - pumps envelopes from a transport into the dispatcher
//! - `EventDispatcher` - routes events to the handler registered for their type
//! - `MessageCreateHandler` - answers `!echo` messages
//! - `SerenityTransport` / `SerenityChannels` - the live Discord implementations

pub mod channels;
pub mod client;
pub mod events;
pub mod gateway;
