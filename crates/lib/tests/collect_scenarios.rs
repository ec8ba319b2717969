//! Integration test: run the collector against a scripted source and check the JSON-lines
//! output and diagnostics the way a downstream consumer would read them.
//! Does not require a Telegram session.

use chrono::{DateTime, Duration, TimeZone, Utc};
use lib::boundary::TimeBoundary;
use lib::channel::parse_channel_list;
use lib::collect::Collector;
use lib::record::{parse_jsonl, NormalizedRecord};
use lib::source::{ChannelScript, RawMessage, ScriptedSource, SourceError};
use lib::walk::WalkLimits;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap()
}

fn msg(id: i64, offset_secs: i64, text: Option<&str>) -> RawMessage {
    RawMessage {
        id,
        date: t0() + Duration::seconds(offset_secs),
        text: text.map(String::from),
    }
}

struct RunOutput {
    stdout: String,
    stderr: String,
}

async fn run(source: &ScriptedSource, channels: &str) -> RunOutput {
    let mut collector = Collector::new(Vec::new(), Vec::new(), WalkLimits::default());
    collector
        .run_scoped(source, &parse_channel_list(channels), TimeBoundary::new(t0()))
        .await
        .expect("run succeeds");
    let (out, diag) = collector.into_inner();
    RunOutput {
        stdout: String::from_utf8(out).expect("utf-8 stdout"),
        stderr: String::from_utf8(diag).expect("utf-8 stderr"),
    }
}

#[tokio::test]
async fn private_channel_is_skipped_and_bare_prefix_is_canonical() {
    let source = ScriptedSource::new()
        .with_channel(
            "alpha",
            ChannelScript::messages(vec![
                msg(12, 2, Some("second")),
                msg(11, 1, Some("first")),
                msg(10, -1, Some("too old")),
            ]),
        )
        .with_channel("beta", ChannelScript::Unavailable("private or not joined".into()));

    let out = run(&source, "alpha,@beta").await;

    let records = parse_jsonl(out.stdout.as_bytes()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.channel == "alpha"));
    assert_eq!(records[0].msg_id, "12");
    assert_eq!(records[1].msg_id, "11");

    let diag: Vec<&str> = out.stderr.lines().collect();
    assert_eq!(diag.len(), 1);
    assert!(diag[0].contains("beta"));
    assert!(diag[0].contains("private"));
    assert!(source.is_closed());
}

#[tokio::test]
async fn rate_limit_keeps_records_already_produced_and_moves_on() {
    let source = ScriptedSource::new()
        .with_channel(
            "alpha",
            ChannelScript::failing_after(
                vec![msg(3, 3, Some("c")), msg(2, 2, Some("b")), msg(1, 1, Some("a"))],
                SourceError::RateLimited(30),
            ),
        )
        .with_channel("gamma", ChannelScript::messages(vec![msg(7, 1, Some("after"))]));

    let out = run(&source, "alpha,gamma").await;

    let records = parse_jsonl(out.stdout.as_bytes()).unwrap();
    let alpha: Vec<&NormalizedRecord> = records.iter().filter(|r| r.channel == "alpha").collect();
    assert_eq!(alpha.len(), 3);
    assert_eq!(records.last().unwrap().channel, "gamma");

    let diag: Vec<&str> = out.stderr.lines().collect();
    assert_eq!(diag.len(), 1);
    assert!(diag[0].contains("30"));
    assert!(diag[0].contains("alpha"));
}

#[tokio::test]
async fn transport_fault_mid_history_keeps_records_and_moves_on() {
    let source = ScriptedSource::new()
        .with_channel(
            "a",
            ChannelScript::failing_after(
                vec![msg(5, 20, Some("one")), msg(4, 10, Some("two"))],
                SourceError::Transport("reset".into()),
            ),
        )
        .with_channel(
            "b",
            ChannelScript::messages(vec![
                msg(9, 60, Some("newer")),
                msg(8, 0, Some("at boundary")),
                msg(7, -60, Some("older")),
            ]),
        );

    let mut collector = Collector::new(Vec::new(), Vec::new(), WalkLimits::default());
    let boundary = TimeBoundary::parse("2026-02-16T12:00:00+02:00").unwrap();
    let summary = collector
        .run_scoped(&source, &parse_channel_list("a,@b"), boundary)
        .await
        .expect("run succeeds");
    let (out, diag) = collector.into_inner();

    let records = parse_jsonl(out.as_slice()).unwrap();
    let ids: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.channel.as_str(), r.msg_id.as_str()))
        .collect();
    assert_eq!(ids, vec![("a", "5"), ("a", "4"), ("b", "9"), ("b", "8")]);
    assert_eq!(String::from_utf8(diag).unwrap(), "channel a: reset\n");
    assert_eq!(summary.faulted().count(), 1);
    assert_eq!(summary.channels[0].emitted, 2);
}

#[tokio::test]
async fn resolution_error_does_not_stop_later_channels() {
    let source = ScriptedSource::new()
        .with_channel("a", ChannelScript::ResolveError("connection reset by peer".into()))
        .with_channel("b", ChannelScript::messages(vec![msg(1, 1, Some("still here"))]));

    let out = run(&source, "a, b").await;

    let records = parse_jsonl(out.stdout.as_bytes()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "still here");
    assert_eq!(out.stderr, "channel a: connection reset by peer\n");
}

#[tokio::test]
async fn every_line_has_exactly_five_string_fields() {
    let source = ScriptedSource::new().with_channel(
        "devops_ru",
        ChannelScript::messages(vec![
            msg(101, 3, Some("CVE-2026-1234 discovered")),
            msg(100, 2, None),
            msg(99, 1, Some("привет")),
        ]),
    );

    let out = run(&source, "@devops_ru").await;

    for line in out.stdout.lines() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        let obj = v.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["channel", "date", "msg_id", "text", "url"]);
        assert!(obj.values().all(|v| v.is_string()));
        let channel = obj["channel"].as_str().unwrap();
        let msg_id = obj["msg_id"].as_str().unwrap();
        assert_eq!(
            obj["url"].as_str().unwrap(),
            format!("https://t.me/{}/{}", channel, msg_id)
        );
        assert!(!obj["text"].as_str().unwrap().trim().is_empty());
    }
    assert_eq!(out.stdout.lines().count(), 2);
    assert!(out.stdout.contains("привет"));
}

#[tokio::test]
async fn nothing_older_than_boundary_is_emitted() {
    let source = ScriptedSource::new().with_channel(
        "alpha",
        ChannelScript::messages((0..20).map(|i| msg(100 - i, 5 - i, Some("x"))).collect()),
    );

    let out = run(&source, "alpha").await;

    let records = parse_jsonl(out.stdout.as_bytes()).unwrap();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.posted_at().unwrap() >= t0()));
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let source = || {
        ScriptedSource::new()
            .with_channel(
                "alpha",
                ChannelScript::messages(vec![msg(2, 2, Some("b")), msg(1, 1, Some("a"))]),
            )
            .with_channel("beta", ChannelScript::Unavailable("private or not joined".into()))
    };

    let first = run(&source(), "alpha,@beta").await;
    let second = run(&source(), "alpha,@beta").await;
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first.stderr, second.stderr);
}
