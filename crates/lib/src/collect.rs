//! Collection orchestrator: walks each requested channel in order and forwards records to
//! the emitter as they are produced.
//!
//! Per-channel faults become one diagnostic line each and never stop the loop. Only a
//! failure to write the primary output aborts a run.

use futures_util::StreamExt;
use std::io::Write;

use crate::boundary::TimeBoundary;
use crate::channel::ChannelRequest;
use crate::emit::{EmitError, JsonLinesEmitter};
use crate::source::{MessageSource, SourceError};
use crate::walk::{walk, WalkLimits};

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Result of walking one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    /// Channel as requested by the caller.
    pub channel: String,
    pub emitted: usize,
    pub fault: Option<SourceError>,
}

/// Per-channel outcomes of a run, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub channels: Vec<ChannelOutcome>,
}

impl RunSummary {
    pub fn total_emitted(&self) -> usize {
        self.channels.iter().map(|c| c.emitted).sum()
    }

    /// Channels whose walk ended in a fault.
    pub fn faulted(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.channels.iter().filter(|c| c.fault.is_some())
    }
}

/// Human-readable diagnostic for a per-channel fault.
pub fn diagnostic_line(request: &ChannelRequest, fault: &SourceError) -> String {
    match fault {
        SourceError::RateLimited(seconds) => {
            format!("rate limited for {}s on {}, skipping", seconds, request.raw())
        }
        other => format!("channel {}: {}", request.raw(), other),
    }
}

/// Drives channel walks and owns both output streams: records go to `W`, diagnostics to `D`.
pub struct Collector<W: Write, D: Write> {
    emitter: JsonLinesEmitter<W>,
    diagnostics: D,
    limits: WalkLimits,
}

impl<W: Write, D: Write> Collector<W, D> {
    pub fn new(out: W, diagnostics: D, limits: WalkLimits) -> Self {
        Self {
            emitter: JsonLinesEmitter::new(out),
            diagnostics,
            limits,
        }
    }

    /// Walk every request in order, one channel at a time.
    pub async fn run<S>(
        &mut self,
        source: &S,
        requests: &[ChannelRequest],
        boundary: TimeBoundary,
    ) -> Result<RunSummary, CollectError>
    where
        S: MessageSource + ?Sized,
    {
        log::info!(
            "collecting {} channel(s) since {} (max {} messages each)",
            requests.len(),
            boundary,
            self.limits.max_messages
        );
        let mut summary = RunSummary::default();
        for request in requests {
            let outcome = self.collect_channel(source, request, boundary).await?;
            summary.channels.push(outcome);
        }
        log::info!(
            "collected {} record(s); {} of {} channel(s) faulted",
            summary.total_emitted(),
            summary.faulted().count(),
            summary.channels.len()
        );
        Ok(summary)
    }

    /// Like [`Collector::run`], but owns the source and closes it on every exit path.
    pub async fn run_scoped<S>(
        &mut self,
        source: S,
        requests: &[ChannelRequest],
        boundary: TimeBoundary,
    ) -> Result<RunSummary, CollectError>
    where
        S: MessageSource,
    {
        let result = self.run(&source, requests, boundary).await;
        source.close().await;
        result
    }

    async fn collect_channel<S>(
        &mut self,
        source: &S,
        request: &ChannelRequest,
        boundary: TimeBoundary,
    ) -> Result<ChannelOutcome, CollectError>
    where
        S: MessageSource + ?Sized,
    {
        let mut emitted = 0;
        let mut fault = None;
        {
            let mut records = std::pin::pin!(walk(source, request, boundary, &self.limits));
            while let Some(item) = records.next().await {
                match item {
                    Ok(record) => {
                        self.emitter.emit(&record)?;
                        emitted += 1;
                    }
                    Err(e) => {
                        fault = Some(e);
                        break;
                    }
                }
            }
        }
        if let Some(e) = &fault {
            self.diagnose(&diagnostic_line(request, e));
        }
        log::debug!("channel {}: {} record(s) emitted", request.raw(), emitted);
        Ok(ChannelOutcome {
            channel: request.raw().to_string(),
            emitted,
            fault,
        })
    }

    fn diagnose(&mut self, line: &str) {
        let written = writeln!(self.diagnostics, "{}", line).and_then(|_| self.diagnostics.flush());
        if let Err(e) = written {
            log::debug!("writing diagnostic failed: {}", e);
        }
    }

    /// Records written to the primary stream so far.
    pub fn emitted(&self) -> usize {
        self.emitter.emitted()
    }

    pub fn into_inner(self) -> (W, D) {
        (self.emitter.into_inner(), self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::parse_channel_list;
    use crate::source::{ChannelScript, RawMessage, ScriptedSource};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap()
    }

    fn msg(id: i64, offset_secs: i64, text: &str) -> RawMessage {
        RawMessage {
            id,
            date: t0() + Duration::seconds(offset_secs),
            text: Some(text.to_string()),
        }
    }

    fn collector() -> Collector<Vec<u8>, Vec<u8>> {
        Collector::new(Vec::new(), Vec::new(), WalkLimits::default())
    }

    #[test]
    fn diagnostic_lines() {
        let beta = ChannelRequest::new("@beta");
        assert_eq!(
            diagnostic_line(
                &beta,
                &SourceError::ChannelUnavailable("private or not joined".into())
            ),
            "channel @beta: private or not joined"
        );
        assert_eq!(
            diagnostic_line(&beta, &SourceError::RateLimited(30)),
            "rate limited for 30s on @beta, skipping"
        );
        assert_eq!(
            diagnostic_line(&beta, &SourceError::Transport("connection reset".into())),
            "channel @beta: connection reset"
        );
    }

    #[tokio::test]
    async fn unavailable_channel_does_not_block_later_channels() {
        let src = ScriptedSource::new()
            .with_channel("alpha", ChannelScript::Unavailable("private or not joined".into()))
            .with_channel("beta", ChannelScript::messages(vec![msg(1, 1, "hello")]));
        let mut c = collector();
        let summary = c
            .run(&src, &parse_channel_list("alpha,beta"), TimeBoundary::new(t0()))
            .await
            .unwrap();
        assert_eq!(summary.channels.len(), 2);
        assert_eq!(summary.channels[0].emitted, 0);
        assert!(summary.channels[0].fault.is_some());
        assert_eq!(summary.channels[1].emitted, 1);
        let (out, diag) = c.into_inner();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
        assert_eq!(
            String::from_utf8(diag).unwrap(),
            "channel alpha: private or not joined\n"
        );
    }

    #[tokio::test]
    async fn channels_are_walked_in_request_order() {
        let src = ScriptedSource::new()
            .with_channel("a", ChannelScript::messages(vec![msg(1, 1, "a1")]))
            .with_channel("b", ChannelScript::messages(vec![msg(2, 1, "b1")]))
            .with_channel("c", ChannelScript::messages(vec![msg(3, 1, "c1")]));
        let mut c = collector();
        c.run(&src, &parse_channel_list("c,@a,b"), TimeBoundary::new(t0()))
            .await
            .unwrap();
        assert_eq!(src.resolved(), vec!["c", "a", "b"]);
        assert_eq!(c.emitted(), 3);
    }

    #[tokio::test]
    async fn scoped_run_closes_source() {
        let src = ScriptedSource::new();
        let mut c = collector();
        let summary = c
            .run_scoped(&src, &parse_channel_list("ghost"), TimeBoundary::new(t0()))
            .await
            .unwrap();
        assert_eq!(summary.faulted().count(), 1);
        assert!(src.is_closed());
    }

    #[tokio::test]
    async fn output_failure_aborts_run_and_still_closes() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let src = ScriptedSource::new()
            .with_channel("a", ChannelScript::messages(vec![msg(1, 1, "a1")]));
        let mut c = Collector::new(Broken, Vec::new(), WalkLimits::default());
        let err = c
            .run_scoped(&src, &parse_channel_list("a"), TimeBoundary::new(t0()))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::Emit(_)));
        assert!(src.is_closed());
    }
}
