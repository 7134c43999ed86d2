//! Channel client abstraction.
//!
//! The helper account talks to the messaging network through this trait. The
//! concrete MTProto client lives in the helper binary; everything in this crate
//! only sees the trait, which keeps resolution and forwarding testable.

use async_trait::async_trait;
use thiserror::Error;

/// Identifier of a message inside a channel.
pub type MessageId = i32;

/// Errors surfaced by a channel client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The server asked us to slow down for the given number of seconds.
    #[error("Rate limited: retry after {seconds}s")]
    FloodWait {
        /// Server-specified wait.
        seconds: u64,
    },
    /// The helper identity is not authorized.
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    /// A peer or message could not be found.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Read/forward primitives of the helper account.
///
/// `Peer` is whatever handle the client needs to address a chat again after
/// it has been resolved once.
#[cfg_attr(test, mockall::automock(type Peer = i64;))]
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Resolved chat handle.
    type Peer: Clone + Send + Sync + std::fmt::Debug + 'static;

    /// Whether the stored session is authorized.
    async fn is_authorized(&self) -> Result<bool, ChannelError>;

    /// Resolve a channel id (`-100...`, bare id) or a `@username` into a peer.
    async fn resolve_peer(&self, handle: &str) -> Result<Option<Self::Peer>, ChannelError>;

    /// Every message id in the channel, newest first.
    async fn history_ids(&self, channel: &Self::Peer) -> Result<Vec<MessageId>, ChannelError>;

    /// Ids of messages whose text matches `query`, newest first, at most `limit`.
    async fn search_ids(
        &self,
        channel: &Self::Peer,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MessageId>, ChannelError>;

    /// Forward `ids` from `source` to `destination` in a single call.
    async fn forward(
        &self,
        source: &Self::Peer,
        destination: &Self::Peer,
        ids: &[MessageId],
    ) -> Result<(), ChannelError>;

    /// Send a plain text message.
    async fn send_text(&self, destination: &Self::Peer, text: &str) -> Result<(), ChannelError>;
}
