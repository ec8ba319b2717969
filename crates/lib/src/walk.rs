//! Channel walker: one bounded, newest-first pass over a single channel's history.
//!
//! The walk stops at the first message older than the time boundary, after
//! `max_messages` raw messages, when history runs out, or at the first source fault.
//! Messages without text are skipped without stopping the walk. Messages are assumed
//! to arrive in non-increasing time order; an out-of-order older message ends the walk early.

use futures_util::stream::{self, BoxStream, Stream, StreamExt};

use crate::boundary::TimeBoundary;
use crate::channel::ChannelRequest;
use crate::record::{NormalizedRecord, DEFAULT_PERMALINK_BASE};
use crate::source::{MessageSource, RawMessage, SourceError};

/// Upper bound on raw messages pulled per channel per run.
pub const MAX_MESSAGES_PER_CHANNEL: usize = 100;

/// Per-run walk settings shared by every channel.
#[derive(Debug, Clone)]
pub struct WalkLimits {
    pub max_messages: usize,
    pub permalink_base: String,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_messages: MAX_MESSAGES_PER_CHANNEL,
            permalink_base: DEFAULT_PERMALINK_BASE.to_string(),
        }
    }
}

enum WalkState<'a> {
    Unresolved,
    Walking {
        history: stream::Take<BoxStream<'a, Result<RawMessage, SourceError>>>,
        pulled: usize,
    },
}

/// Walk one channel. Yields records as they are produced; an `Err` item is always last.
/// Nothing is fetched until the stream is first polled.
pub fn walk<'a, S>(
    source: &'a S,
    request: &'a ChannelRequest,
    boundary: TimeBoundary,
    limits: &'a WalkLimits,
) -> impl Stream<Item = Result<NormalizedRecord, SourceError>> + 'a
where
    S: MessageSource + ?Sized,
{
    stream::unfold(Some(WalkState::Unresolved), move |state| async move {
        let Some(state) = state else {
            return None;
        };
        let (mut history, mut pulled) = match state {
            WalkState::Unresolved => match source.resolve(request).await {
                Ok(handle) => {
                    log::debug!("channel {}: resolved", request.raw());
                    let history = source
                        .history(&handle, limits.max_messages)
                        .take(limits.max_messages);
                    (history, 0)
                }
                Err(e) => return Some((Err(e), None)),
            },
            WalkState::Walking { history, pulled } => (history, pulled),
        };

        loop {
            let raw = match history.next().await {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    if pulled >= limits.max_messages {
                        log::debug!(
                            "channel {}: stopped at cap of {} messages",
                            request.raw(),
                            limits.max_messages
                        );
                    } else {
                        log::debug!(
                            "channel {}: history exhausted after {} messages",
                            request.raw(),
                            pulled
                        );
                    }
                    return None;
                }
            };
            pulled += 1;

            if !boundary.admits(raw.date) {
                log::debug!(
                    "channel {}: reached time boundary at message {} ({})",
                    request.raw(),
                    raw.id,
                    raw.date
                );
                return None;
            }

            let id = raw.id;
            match NormalizedRecord::from_raw(request.name(), raw, &limits.permalink_base) {
                Some(record) => {
                    return Some((Ok(record), Some(WalkState::Walking { history, pulled })));
                }
                None => {
                    log::trace!("channel {}: message {} has no text, skipped", request.raw(), id)
                }
            }
        }
    })
}
