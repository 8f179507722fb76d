use std::sync::Arc;

use async_trait::async_trait;
use echobot_core::ChannelRef;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Guild,
    Private,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub id: ChannelRef,
    pub kind: ChannelKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("invalid channel reference `{0}`")]
    InvalidReference(String),
    #[error("channel lookup failed for `{channel}`: {reason}")]
    Resolve { channel: String, reason: String },
    #[error("message delivery to `{channel}` failed: {reason}")]
    Send { channel: String, reason: String },
}

/// Outbound side of the platform: look a channel up, then post into it.
#[async_trait]
pub trait MessageChannels: Send + Sync {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ResolvedChannel, ChannelError>;

    /// Returns the id of the delivered message.
    async fn send_message(
        &self,
        channel: &ResolvedChannel,
        text: &str,
    ) -> Result<String, ChannelError>;
}

#[async_trait]
impl<T> MessageChannels for Arc<T>
where
    T: MessageChannels + ?Sized,
{
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ResolvedChannel, ChannelError> {
        self.as_ref().resolve_channel(channel).await
    }

    async fn send_message(
        &self,
        channel: &ResolvedChannel,
        text: &str,
    ) -> Result<String, ChannelError> {
        self.as_ref().send_message(channel, text).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use echobot_core::ChannelRef;
    use tokio::sync::Mutex;

    use super::{ChannelError, ChannelKind, MessageChannels, ResolvedChannel};

    /// In-memory channels that record every call and can be scripted to fail.
    #[derive(Default)]
    pub(crate) struct RecordingChannels {
        state: Mutex<RecordingState>,
    }

    #[derive(Default)]
    struct RecordingState {
        resolve_failures: VecDeque<ChannelError>,
        send_failures: VecDeque<ChannelError>,
        resolved: Vec<ChannelRef>,
        sent: Vec<(ChannelRef, String)>,
    }

    impl RecordingChannels {
        pub(crate) async fn fail_next_resolve(&self, error: ChannelError) {
            self.state.lock().await.resolve_failures.push_back(error);
        }

        pub(crate) async fn fail_next_send(&self, error: ChannelError) {
            self.state.lock().await.send_failures.push_back(error);
        }

        pub(crate) async fn resolved(&self) -> Vec<ChannelRef> {
            self.state.lock().await.resolved.clone()
        }

        pub(crate) async fn sent(&self) -> Vec<(ChannelRef, String)> {
            self.state.lock().await.sent.clone()
        }
    }

    #[async_trait]
    impl MessageChannels for RecordingChannels {
        async fn resolve_channel(
            &self,
            channel: &ChannelRef,
        ) -> Result<ResolvedChannel, ChannelError> {
            let mut state = self.state.lock().await;
            state.resolved.push(channel.clone());
            if let Some(error) = state.resolve_failures.pop_front() {
                return Err(error);
            }
            Ok(ResolvedChannel { id: channel.clone(), kind: ChannelKind::Guild })
        }

        async fn send_message(
            &self,
            channel: &ResolvedChannel,
            text: &str,
        ) -> Result<String, ChannelError> {
            let mut state = self.state.lock().await;
            if let Some(error) = state.send_failures.pop_front() {
                return Err(error);
            }
            state.sent.push((channel.id.clone(), text.to_owned()));
            Ok(format!("sent-{}", state.sent.len()))
        }
    }
}
