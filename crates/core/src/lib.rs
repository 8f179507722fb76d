//! Core of echobot: message domain types, the `!echo` command, and
//! layered configuration. Nothing in this crate touches the network.

pub mod config;
pub mod domain;
pub mod echo;

pub use domain::message::{ChannelRef, InboundMessage, OutboundMessage};
pub use echo::{echo_argument, echo_reply, ECHO_PREFIX, REPLY_GREETING};
