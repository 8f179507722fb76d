//! The `!echo` prefix command.
//!
//! A message whose text starts with [`ECHO_PREFIX`] is answered in the same
//! channel with [`REPLY_GREETING`] followed by whatever came after the prefix.
//! The first run of whitespace after the prefix is dropped; anything past it
//! is kept verbatim.

use crate::domain::message::{InboundMessage, OutboundMessage};

pub const ECHO_PREFIX: &str = "!echo";
pub const REPLY_GREETING: &str = "Hello! You said ";

/// Returns the command argument when `content` is an echo command.
pub fn echo_argument(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(ECHO_PREFIX)?;
    Some(rest.trim_start_matches(is_command_whitespace))
}

/// Builds the reply for `message`, or `None` when it is not an echo command.
pub fn echo_reply(message: &InboundMessage) -> Option<OutboundMessage> {
    let argument = echo_argument(message.text())?;
    Some(OutboundMessage {
        channel: message.channel.clone(),
        text: format!("{REPLY_GREETING}{argument}"),
    })
}

// Same class as a regex `\s`: ASCII only, vertical tab included.
fn is_command_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}
