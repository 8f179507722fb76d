use echobot_core::{echo_reply, ChannelRef, InboundMessage, ECHO_PREFIX};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct EchoPreview<'a> {
    command: &'static str,
    status: &'static str,
    matched: bool,
    reply: Option<String>,
    message: &'a str,
}

/// Runs the echo command against `content` without touching Discord.
pub fn run(content: &str) -> CommandResult {
    let message = InboundMessage {
        id: "preview".to_owned(),
        channel: ChannelRef("preview".to_owned()),
        author_id: "preview".to_owned(),
        content: Some(content.to_owned()),
    };

    let reply = echo_reply(&message).map(|reply| reply.text);
    let summary = if reply.is_some() {
        "reply would be sent to the originating channel".to_owned()
    } else {
        format!("ignored: message does not start with `{ECHO_PREFIX}`")
    };

    let preview = EchoPreview {
        command: "echo",
        status: "ok",
        matched: reply.is_some(),
        reply,
        message: &summary,
    };

    match serde_json::to_string(&preview) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("echo", "serialization", error.to_string(), 1),
    }
}
