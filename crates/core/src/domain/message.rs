use std::fmt;

/// Opaque reference to the channel a message was posted in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelRef(pub String);

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub channel: ChannelRef,
    pub author_id: String,
    pub content: Option<String>,
}

impl InboundMessage {
    /// Message text, with absent content read as the empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: ChannelRef,
    pub text: String,
}
