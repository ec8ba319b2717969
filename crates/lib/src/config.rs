//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tgcollect/config.json`) and environment.
//! Command-line flags take precedence over both; see [`resolve_api_id`] and friends.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::record::DEFAULT_PERMALINK_BASE;
use crate::walk::{WalkLimits, MAX_MESSAGES_PER_CHANNEL};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Telegram credentials and session location.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Collection defaults (channels, per-channel cap, permalink base).
    #[serde(default)]
    pub collect: CollectConfig,
}

/// Telegram application credentials (from my.telegram.org) and session directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Numeric application id. Overridden by TELEGRAM_API_ID env when set.
    pub api_id: Option<i32>,
    /// Application secret. Overridden by TELEGRAM_API_HASH env when set.
    pub api_hash: Option<String>,
    /// Directory holding the session file (default ~/.tgcollect/session).
    pub session_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectConfig {
    /// Channels walked when none are given on the command line.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Upper bound on messages pulled per channel per run (default 100).
    #[serde(default = "default_max_messages")]
    pub max_messages_per_channel: usize,

    /// Base of record permalinks (default "https://t.me").
    #[serde(default = "default_permalink_base")]
    pub permalink_base: String,
}

fn default_max_messages() -> usize {
    MAX_MESSAGES_PER_CHANNEL
}

fn default_permalink_base() -> String {
    DEFAULT_PERMALINK_BASE.to_string()
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            max_messages_per_channel: default_max_messages(),
            permalink_base: default_permalink_base(),
        }
    }
}

impl CollectConfig {
    pub fn walk_limits(&self) -> WalkLimits {
        WalkLimits {
            max_messages: self.max_messages_per_channel,
            permalink_base: self.permalink_base.clone(),
        }
    }
}

/// First non-blank value, trimmed: flag, then env, then config.
fn first_non_blank(candidates: [Option<String>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve the api id: flag, then env TELEGRAM_API_ID, then config.
pub fn resolve_api_id(config: &Config, flag: Option<i32>) -> Result<Option<i32>> {
    let value = first_non_blank([
        flag.map(|v| v.to_string()),
        env_var("TELEGRAM_API_ID"),
        config.telegram.api_id.map(|v| v.to_string()),
    ]);
    value
        .map(|v| {
            v.parse::<i32>()
                .with_context(|| format!("api id must be numeric, got {:?}", v))
        })
        .transpose()
}

/// Resolve the api hash: flag, then env TELEGRAM_API_HASH, then config.
pub fn resolve_api_hash(config: &Config, flag: Option<String>) -> Option<String> {
    first_non_blank([
        flag,
        env_var("TELEGRAM_API_HASH"),
        config.telegram.api_hash.clone(),
    ])
}

/// Resolve the session directory: flag, then config, then `session` next to the config file.
pub fn resolve_session_dir(config: &Config, config_path: &Path, flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| config.telegram.session_dir.clone())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| config_dir(config_path).join("session"))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TGCOLLECT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".tgcollect").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Directory containing the config file.
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Load config from the given path, TGCOLLECT_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
