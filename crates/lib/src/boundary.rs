//! Time boundary for a run: the UTC instant below which channel walks stop.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, thiserror::Error)]
#[error("invalid timestamp {input:?}: expected ISO-8601 (e.g. 2026-02-16T10:00:00Z)")]
pub struct BoundaryError {
    input: String,
}

/// Lower time bound shared by every channel walk in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBoundary(DateTime<Utc>);

impl TimeBoundary {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Parse an ISO-8601 timestamp. Offsets are converted to UTC; timestamps without an
    /// offset and bare dates are taken as UTC.
    pub fn parse(input: &str) -> Result<Self, BoundaryError> {
        let s = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self(naive.and_utc()));
            }
        }
        if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(Self(midnight.and_utc()));
        }
        Err(BoundaryError {
            input: input.to_string(),
        })
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// True when a message created at `ts` is in scope (at or after the boundary).
    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.0
    }
}

impl std::fmt::Display for TimeBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
