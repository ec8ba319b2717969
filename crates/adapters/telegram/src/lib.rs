//! Telegram adapter: MTProto user session (grammers), username resolution, and
//! lazily paged channel history, newest first.
//!
//! The session file lives in a caller-chosen directory. `collect` never prompts;
//! an unauthorized session must be signed in once with [`TelegramSession::login`].

use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use grammers_client::{Client, Config, InitParams, InvocationError, SignInError};
use grammers_session::Session;
use std::path::{Path, PathBuf};

pub use grammers_session::PackedChat;

const SESSION_FILE_NAME: &str = "tgcollect.session";

/// Client parameters. Automatic flood-wait sleeping is disabled so every FLOOD_WAIT
/// reaches the caller as [`TelegramError::FloodWait`] instead of being retried in place.
fn init_params() -> InitParams {
    InitParams {
        flood_sleep_threshold: 0,
        ..InitParams::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("session file {}: {source}", path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("session not authorized; run `tgcollect login` first")]
    NotAuthorized,
    #[error("login failed: {0}")]
    Login(String),
    #[error("reading input: {0}")]
    Prompt(#[from] std::io::Error),
    /// Channel is private, not joined, banned, deleted or unknown.
    #[error("{0}")]
    ChannelUnavailable(String),
    #[error("flood wait of {0}s")]
    FloodWait(u32),
    #[error("rpc error {code}: {name}")]
    Rpc { code: i32, name: String },
    #[error("request failed: {0}")]
    Network(String),
}

impl From<InvocationError> for TelegramError {
    fn from(e: InvocationError) -> Self {
        match e {
            InvocationError::Rpc(rpc) => classify_rpc(&rpc.name, rpc.code, rpc.value),
            other => TelegramError::Network(other.to_string()),
        }
    }
}

/// Map an RPC error (name without numeric suffix, plus the parsed value) to a [`TelegramError`].
/// Accepts the raw `FLOOD_WAIT_30` form too.
pub fn classify_rpc(name: &str, code: i32, value: Option<u32>) -> TelegramError {
    let (base, value) = match name.rsplit_once('_') {
        Some((base, suffix)) if value.is_none() && !suffix.is_empty() => {
            match suffix.parse::<u32>() {
                Ok(n) => (base, Some(n)),
                Err(_) => (name, value),
            }
        }
        _ => (name, value),
    };
    match base {
        "FLOOD_WAIT" | "FLOOD_PREMIUM_WAIT" | "SLOWMODE_WAIT" => {
            TelegramError::FloodWait(value.unwrap_or(0))
        }
        "CHANNEL_PRIVATE" => {
            TelegramError::ChannelUnavailable("private or not joined".to_string())
        }
        "CHANNEL_INVALID" => {
            TelegramError::ChannelUnavailable("invalid or deleted channel".to_string())
        }
        "CHANNEL_PUBLIC_GROUP_NA" => {
            TelegramError::ChannelUnavailable("public group not available".to_string())
        }
        "USER_BANNED_IN_CHANNEL" => {
            TelegramError::ChannelUnavailable("banned from channel".to_string())
        }
        "USERNAME_NOT_OCCUPIED" => TelegramError::ChannelUnavailable("no such channel".to_string()),
        _ => TelegramError::Rpc {
            code,
            name: name.to_string(),
        },
    }
}

/// One message as read from channel history.
#[derive(Debug, Clone)]
pub struct TelegramMessage {
    pub id: i32,
    pub date: DateTime<Utc>,
    /// Message text or media caption; empty when the message has neither.
    pub text: String,
}

/// Connected MTProto session. The connection is released when this value is dropped.
pub struct TelegramSession {
    client: Client,
    session_path: PathBuf,
}

impl TelegramSession {
    /// Create `session_dir` if needed, load (or create) the session file in it, and connect.
    pub async fn connect(
        api_id: i32,
        api_hash: &str,
        session_dir: &Path,
    ) -> Result<Self, TelegramError> {
        tokio::fs::create_dir_all(session_dir)
            .await
            .map_err(|source| TelegramError::Session {
                path: session_dir.to_path_buf(),
                source,
            })?;
        let session_path = session_dir.join(SESSION_FILE_NAME);
        let session =
            Session::load_file_or_create(&session_path).map_err(|source| TelegramError::Session {
                path: session_path.clone(),
                source,
            })?;
        log::debug!("telegram: connecting with session {}", session_path.display());
        let client = Client::connect(Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: init_params(),
        })
        .await
        .map_err(|e| TelegramError::Connect(e.to_string()))?;
        log::info!("telegram: connected");
        Ok(Self {
            client,
            session_path,
        })
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        Ok(self.client.is_authorized().await?)
    }

    /// Fail with [`TelegramError::NotAuthorized`] unless the session is signed in.
    pub async fn require_authorized(&self) -> Result<(), TelegramError> {
        if self.is_authorized().await? {
            Ok(())
        } else {
            Err(TelegramError::NotAuthorized)
        }
    }

    /// Interactive sign-in: request a login code for `phone`, ask `prompt` for it (and for the
    /// two-step verification password when the account has one), then save the session.
    /// No-op when the session is already authorized.
    pub async fn login(
        &self,
        phone: &str,
        prompt: &mut dyn FnMut(&str) -> std::io::Result<String>,
    ) -> Result<(), TelegramError> {
        if self.is_authorized().await? {
            log::info!("telegram: session already authorized");
            return Ok(());
        }
        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(|e| TelegramError::Login(e.to_string()))?;
        let code = prompt("login code: ")?;
        match self.client.sign_in(&token, code.trim()).await {
            Ok(_) => {}
            Err(SignInError::PasswordRequired(password_token)) => {
                let password = prompt("two-step verification password: ")?;
                self.client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| TelegramError::Login(e.to_string()))?;
            }
            Err(e) => return Err(TelegramError::Login(e.to_string())),
        }
        self.save()?;
        log::info!("telegram: signed in, session saved to {}", self.session_path.display());
        Ok(())
    }

    /// Resolve a public username (no leading `@`) to a chat usable for history lookups.
    pub async fn resolve_channel(&self, username: &str) -> Result<PackedChat, TelegramError> {
        match self.client.resolve_username(username).await? {
            Some(chat) => Ok(chat.pack()),
            None => Err(TelegramError::ChannelUnavailable("no such channel".to_string())),
        }
    }

    /// Newest-first history of `chat`, fetched lazily in batches, at most `limit` messages.
    /// The stream ends after the first error.
    pub fn message_history(
        &self,
        chat: PackedChat,
        limit: usize,
    ) -> BoxStream<'static, Result<TelegramMessage, TelegramError>> {
        let iter = self.client.iter_messages(chat).limit(limit);
        stream::unfold(Some(iter), |state| async move {
            let Some(mut iter) = state else {
                return None;
            };
            match iter.next().await {
                Ok(Some(message)) => {
                    let message = TelegramMessage {
                        id: message.id(),
                        date: message.date(),
                        text: message.text().to_string(),
                    };
                    Some((Ok(message), Some(iter)))
                }
                Ok(None) => None,
                Err(e) => Some((Err(TelegramError::from(e)), None)),
            }
        })
        .boxed()
    }

    /// Persist the session (auth key, cached peers) to the session file.
    pub fn save(&self) -> Result<(), TelegramError> {
        self.client
            .session()
            .save_to_file(&self.session_path)
            .map_err(|source| TelegramError::Session {
                path: self.session_path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_never_sleeps_through_flood_waits() {
        assert_eq!(init_params().flood_sleep_threshold, 0);
    }

    #[test]
    fn flood_wait_carries_seconds() {
        match classify_rpc("FLOOD_WAIT", 420, Some(30)) {
            TelegramError::FloodWait(s) => assert_eq!(s, 30),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn flood_wait_suffix_form_is_parsed() {
        match classify_rpc("FLOOD_WAIT_75", 420, None) {
            TelegramError::FloodWait(s) => assert_eq!(s, 75),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn private_channel_is_unavailable() {
        let err = classify_rpc("CHANNEL_PRIVATE", 400, None);
        assert!(matches!(err, TelegramError::ChannelUnavailable(_)));
        assert_eq!(err.to_string(), "private or not joined");
    }

    #[test]
    fn unknown_username_is_unavailable() {
        assert!(matches!(
            classify_rpc("USERNAME_NOT_OCCUPIED", 400, None),
            TelegramError::ChannelUnavailable(_)
        ));
    }

    #[test]
    fn other_rpc_errors_keep_name_and_code() {
        match classify_rpc("USERNAME_INVALID", 400, None) {
            TelegramError::Rpc { code, name } => {
                assert_eq!(code, 400);
                assert_eq!(name, "USERNAME_INVALID");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn not_authorized_message_points_to_login() {
        assert!(TelegramError::NotAuthorized.to_string().contains("tgcollect login"));
    }
}
