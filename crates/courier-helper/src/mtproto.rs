//! MTProto channel client backed by `grammers`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use courier_core::channel::{ChannelClient, ChannelError, MessageId};
use courier_core::config::HelperSettings;
use grammers_client::{Client, Config, InitParams};
use grammers_mtsender::InvocationError;
use grammers_session::{PackedChat, Session};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Offset between `-100…` channel ids and bare channel ids.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// How a peer was named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PeerHandle {
    /// Public username, without `@`.
    Username(String),
    /// Bare chat id (no `-100` prefix).
    ChatId(i64),
}

fn parse_handle(handle: &str) -> PeerHandle {
    let handle = handle.trim();
    match handle.parse::<i64>() {
        Ok(id) if id <= -CHANNEL_ID_OFFSET => PeerHandle::ChatId(-id - CHANNEL_ID_OFFSET),
        Ok(id) => PeerHandle::ChatId(id.abs()),
        Err(_) => PeerHandle::Username(handle.trim_start_matches('@').to_string()),
    }
}

fn classify_rpc(code: i32, name: &str, value: Option<u32>) -> ChannelError {
    if name.starts_with("FLOOD_WAIT") || name.starts_with("SLOWMODE_WAIT") {
        return ChannelError::FloodWait {
            seconds: u64::from(value.unwrap_or(0)),
        };
    }
    match (code, name) {
        (401, _) | (_, "AUTH_KEY_UNREGISTERED" | "SESSION_REVOKED") => {
            ChannelError::Unauthorized(name.to_string())
        }
        (_, "CHANNEL_PRIVATE" | "CHANNEL_INVALID" | "USERNAME_NOT_OCCUPIED" | "USERNAME_INVALID"
            | "PEER_ID_INVALID") => ChannelError::NotFound(name.to_string()),
        _ => ChannelError::Transport(format!("RPC {code} {name}")),
    }
}

fn channel_error(e: InvocationError) -> ChannelError {
    match e {
        InvocationError::Rpc(rpc) => classify_rpc(rpc.code, &rpc.name, rpc.value),
        other => ChannelError::Transport(other.to_string()),
    }
}

/// Helper account connection.
pub struct GrammersChannel {
    client: Client,
    session_file: PathBuf,
}

impl GrammersChannel {
    /// Connect with the stored session. No interactive login is attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be read or the connection fails.
    pub async fn connect(settings: &HelperSettings) -> Result<Self> {
        let session_file = PathBuf::from(&settings.helper_session_file);
        let session = Session::load_file_or_create(&session_file)
            .with_context(|| format!("cannot open session file {}", session_file.display()))?;

        let client = Client::connect(Config {
            session,
            api_id: settings.helper_api_id,
            api_hash: settings.helper_api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .context("failed to connect to Telegram")?;

        info!(session = %session_file.display(), "Helper client connected");
        Ok(Self {
            client,
            session_file,
        })
    }

    /// Persist the session so the next run reuses the authorization.
    pub fn save_session(&self) {
        if let Err(e) = self.client.session().save_to_file(&self.session_file) {
            warn!(error = %e, "Failed to save helper session");
        }
    }

    async fn find_dialog(&self, bare_id: i64) -> Result<Option<PackedChat>, ChannelError> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(channel_error)? {
            let chat = dialog.chat();
            if chat.id() == bare_id {
                return Ok(Some(chat.pack()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ChannelClient for GrammersChannel {
    type Peer = PackedChat;

    async fn is_authorized(&self) -> Result<bool, ChannelError> {
        self.client.is_authorized().await.map_err(channel_error)
    }

    async fn resolve_peer(&self, handle: &str) -> Result<Option<PackedChat>, ChannelError> {
        match parse_handle(handle) {
            PeerHandle::Username(name) => {
                let chat = self
                    .client
                    .resolve_username(&name)
                    .await
                    .map_err(channel_error)?;
                Ok(chat.map(|c| c.pack()))
            }
            PeerHandle::ChatId(id) => self.find_dialog(id).await,
        }
    }

    async fn history_ids(&self, channel: &PackedChat) -> Result<Vec<MessageId>, ChannelError> {
        let mut ids = Vec::new();
        let mut messages = self.client.iter_messages(*channel);
        while let Some(message) = messages.next().await.map_err(channel_error)? {
            ids.push(message.id());
        }
        debug!(count = ids.len(), "Channel history enumerated");
        Ok(ids)
    }

    async fn search_ids(
        &self,
        channel: &PackedChat,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MessageId>, ChannelError> {
        let mut ids = Vec::new();
        let mut messages = self
            .client
            .search_messages(*channel)
            .query(query)
            .limit(limit);
        while let Some(message) = messages.next().await.map_err(channel_error)? {
            ids.push(message.id());
        }
        Ok(ids)
    }

    async fn forward(
        &self,
        source: &PackedChat,
        destination: &PackedChat,
        ids: &[MessageId],
    ) -> Result<(), ChannelError> {
        self.client
            .forward_messages(*destination, ids, *source)
            .await
            .map(|_| ())
            .map_err(channel_error)
    }

    async fn send_text(&self, destination: &PackedChat, text: &str) -> Result<(), ChannelError> {
        self.client
            .send_message(*destination, text)
            .await
            .map(|_| ())
            .map_err(channel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handle() {
        assert_eq!(parse_handle("-1001234567890"), PeerHandle::ChatId(1_234_567_890));
        assert_eq!(parse_handle("-4567"), PeerHandle::ChatId(4567));
        assert_eq!(parse_handle("777"), PeerHandle::ChatId(777));
        assert_eq!(
            parse_handle("@courier_bot"),
            PeerHandle::Username("courier_bot".into())
        );
        assert_eq!(
            parse_handle(" courier_bot "),
            PeerHandle::Username("courier_bot".into())
        );
    }

    #[test]
    fn test_classify_rpc() {
        assert_eq!(
            classify_rpc(420, "FLOOD_WAIT", Some(31)),
            ChannelError::FloodWait { seconds: 31 }
        );
        assert!(matches!(
            classify_rpc(401, "AUTH_KEY_UNREGISTERED", None),
            ChannelError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_rpc(400, "CHANNEL_PRIVATE", None),
            ChannelError::NotFound(_)
        ));
        assert!(matches!(
            classify_rpc(400, "MESSAGE_ID_INVALID", None),
            ChannelError::Transport(_)
        ));
    }
}
