//! Telegram binding of [`MessageSource`] over the MTProto adapter crate.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};

use super::{MessageSource, RawMessage, SourceError};
use crate::channel::ChannelRequest;

pub use telegram_source::{PackedChat, TelegramError, TelegramMessage, TelegramSession};

/// Classify an adapter error raised while resolving a channel.
fn resolve_error(e: TelegramError) -> SourceError {
    match e {
        TelegramError::ChannelUnavailable(reason) => SourceError::ChannelUnavailable(reason),
        TelegramError::FloodWait(s) => SourceError::RateLimited(s),
        other => SourceError::Resolution(other.to_string()),
    }
}

/// Classify an adapter error raised mid-history.
fn history_error(e: TelegramError) -> SourceError {
    match e {
        TelegramError::FloodWait(s) => SourceError::RateLimited(s),
        other => SourceError::Transport(other.to_string()),
    }
}

impl From<TelegramMessage> for RawMessage {
    fn from(m: TelegramMessage) -> Self {
        RawMessage {
            id: i64::from(m.id),
            date: m.date,
            text: Some(m.text).filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl MessageSource for TelegramSession {
    type Handle = PackedChat;

    async fn resolve(&self, request: &ChannelRequest) -> Result<PackedChat, SourceError> {
        self.resolve_channel(request.name()).await.map_err(resolve_error)
    }

    fn history<'a>(
        &'a self,
        handle: &PackedChat,
        page_limit: usize,
    ) -> BoxStream<'a, Result<RawMessage, SourceError>> {
        self.message_history(*handle, page_limit)
            .map(|item| item.map(RawMessage::from).map_err(history_error))
            .boxed()
    }

    async fn close(&self) {
        match self.save() {
            Ok(()) => log::debug!("telegram: session saved to {}", self.session_path().display()),
            Err(e) => log::warn!("telegram: saving session failed: {}", e),
        }
    }
}
