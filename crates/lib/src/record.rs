//! Normalized records: the provider-independent shape of one collected message,
//! written as one JSON object per line.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

use crate::source::RawMessage;

/// Default base for message permalinks.
pub const DEFAULT_PERMALINK_BASE: &str = "https://t.me";

/// One collected message. Every field is a string; `msg_id` is stringified so large
/// identifiers survive consumers that parse numbers as doubles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub channel: String,
    pub msg_id: String,
    pub date: String,
    pub text: String,
    pub url: String,
}

impl NormalizedRecord {
    /// Shape a raw message for `channel` (canonical name). Returns `None` when the message has
    /// no text worth emitting (absent, empty, or whitespace only).
    pub fn from_raw(channel: &str, raw: RawMessage, permalink_base: &str) -> Option<Self> {
        let text = raw.text.filter(|t| !t.trim().is_empty())?;
        let msg_id = raw.id.to_string();
        Some(Self {
            channel: channel.to_string(),
            url: permalink(permalink_base, channel, &msg_id),
            date: format_date(raw.date),
            msg_id,
            text,
        })
    }

    /// Parsed `date` field.
    pub fn posted_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.date).map(|d| d.with_timezone(&Utc))
    }
}

/// `<base>/<channel>/<msg_id>`; a trailing slash on `base` is ignored.
pub fn permalink(base: &str, channel: &str, msg_id: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), channel, msg_id)
}

/// RFC 3339 in UTC with an explicit `+00:00` offset.
pub fn format_date(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("line {line}: invalid json: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: invalid date {date:?}")]
    Date { line: usize, date: String },
    #[error("read jsonl: {0}")]
    Io(#[from] std::io::Error),
}

/// Read JSON-lines output back into records. Blank lines are skipped; the first malformed
/// line fails the whole read with its 1-based line number.
pub fn parse_jsonl<R: BufRead>(reader: R) -> Result<Vec<NormalizedRecord>, RecordError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: NormalizedRecord = serde_json::from_str(line).map_err(|source| RecordError::Json {
            line: line_num,
            source,
        })?;
        if record.posted_at().is_err() {
            return Err(RecordError::Date {
                line: line_num,
                date: record.date,
            });
        }
        records.push(record);
    }
    Ok(records)
}
