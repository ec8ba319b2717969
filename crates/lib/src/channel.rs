//! Channel requests: caller-supplied channel identifiers and their canonical names.

/// One requested channel, as given by the caller (`name` or `@name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    raw: String,
    name: String,
}

impl ChannelRequest {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let name = raw.trim_start_matches('@').to_string();
        Self { raw, name }
    }

    /// Identifier exactly as supplied; used in diagnostics.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Canonical name without the `@` prefix; used in records and permalinks.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Split a comma-separated channel list. Entries are trimmed, empty entries dropped, order kept.
pub fn parse_channel_list(list: &str) -> Vec<ChannelRequest> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ChannelRequest::new)
        .collect()
}
