//! Message sources: the only place remote calls happen.
//!
//! A source resolves a channel request to an opaque handle and produces that channel's
//! history newest first as a lazy stream. Stopping policy (time boundary, per-channel cap)
//! belongs to the walker, not to the source.

mod scripted;
#[cfg(feature = "telegram")]
pub mod telegram;

pub use scripted::{ChannelScript, ScriptedSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

use crate::channel::ChannelRequest;

/// A message as produced by a source. Owned by the walker for one filter/transform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub text: Option<String>,
}

/// Per-channel faults. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Private, not joined, deleted or otherwise inaccessible.
    #[error("{0}")]
    ChannelUnavailable(String),
    #[error("{0}")]
    Resolution(String),
    /// Provider flood control; carries the advised wait in seconds.
    #[error("rate limited for {0}s")]
    RateLimited(u32),
    #[error("{0}")]
    Transport(String),
}

/// Capability interface over a remote message provider.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Opaque channel handle usable for history lookups.
    type Handle: Send + Sync;

    async fn resolve(&self, request: &ChannelRequest) -> Result<Self::Handle, SourceError>;

    /// Reverse-chronological history starting at "now", fetched in batches of at most
    /// `page_limit`. The stream ends after yielding an error.
    fn history<'a>(
        &'a self,
        handle: &Self::Handle,
        page_limit: usize,
    ) -> BoxStream<'a, Result<RawMessage, SourceError>>;

    /// Release the session. Called once at the end of a scoped run, on every path.
    async fn close(&self) {}
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for &T {
    type Handle = T::Handle;

    async fn resolve(&self, request: &ChannelRequest) -> Result<Self::Handle, SourceError> {
        (**self).resolve(request).await
    }

    fn history<'a>(
        &'a self,
        handle: &Self::Handle,
        page_limit: usize,
    ) -> BoxStream<'a, Result<RawMessage, SourceError>> {
        (**self).history(handle, page_limit)
    }

    async fn close(&self) {
        (**self).close().await
    }
}
