//! In-memory test double driven by per-channel scripts: the collection pipeline's tests run
//! against it instead of a provider session.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{MessageSource, RawMessage, SourceError};
use crate::channel::ChannelRequest;

/// What a scripted channel does when resolved and walked.
#[derive(Debug, Clone)]
pub enum ChannelScript {
    /// Resolves; history yields `messages` in the given order, then `fault` if set.
    History {
        messages: Vec<RawMessage>,
        fault: Option<SourceError>,
    },
    /// Resolution fails with [`SourceError::ChannelUnavailable`].
    Unavailable(String),
    /// Resolution fails with [`SourceError::Resolution`].
    ResolveError(String),
}

impl ChannelScript {
    pub fn messages(messages: Vec<RawMessage>) -> Self {
        ChannelScript::History {
            messages,
            fault: None,
        }
    }

    pub fn failing_after(messages: Vec<RawMessage>, fault: SourceError) -> Self {
        ChannelScript::History {
            messages,
            fault: Some(fault),
        }
    }
}

/// Source keyed by canonical channel name. Unknown channels are unavailable.
#[derive(Default)]
pub struct ScriptedSource {
    channels: HashMap<String, ChannelScript>,
    resolved: Mutex<Vec<String>>,
    pulled: AtomicUsize,
    closed: AtomicBool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, name: impl Into<String>, script: ChannelScript) -> Self {
        self.channels.insert(name.into(), script);
        self
    }

    /// Canonical names passed to `resolve`, in call order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Total messages handed out by all history streams.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    type Handle = String;

    async fn resolve(&self, request: &ChannelRequest) -> Result<String, SourceError> {
        if let Ok(mut g) = self.resolved.lock() {
            g.push(request.name().to_string());
        }
        match self.channels.get(request.name()) {
            Some(ChannelScript::History { .. }) => Ok(request.name().to_string()),
            Some(ChannelScript::Unavailable(reason)) => {
                Err(SourceError::ChannelUnavailable(reason.clone()))
            }
            Some(ChannelScript::ResolveError(msg)) => Err(SourceError::Resolution(msg.clone())),
            None => Err(SourceError::ChannelUnavailable("no such channel".to_string())),
        }
    }

    fn history<'a>(
        &'a self,
        handle: &String,
        _page_limit: usize,
    ) -> BoxStream<'a, Result<RawMessage, SourceError>> {
        let items: Vec<Result<RawMessage, SourceError>> = match self.channels.get(handle) {
            Some(ChannelScript::History { messages, fault }) => messages
                .iter()
                .cloned()
                .map(Ok)
                .chain(fault.clone().map(Err))
                .collect(),
            _ => Vec::new(),
        };
        stream::iter(items)
            .inspect(move |item| {
                if item.is_ok() {
                    self.pulled.fetch_add(1, Ordering::SeqCst);
                }
            })
            .boxed()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
