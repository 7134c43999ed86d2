//! Message identifier resolution.
//!
//! A resolution identifier selects which source messages to fetch. It is
//! interpreted in a fixed priority order:
//! 1. the [`FETCH_EVERYTHING`] sentinel selects the whole channel history;
//! 2. whitespace separated, purely numeric tokens are an explicit id list;
//! 3. anything else is a free-text search capped at [`SEARCH_RESULT_LIMIT`].
//!
//! The result is always oldest first.

use crate::channel::{ChannelClient, ChannelError, MessageId};
use crate::config::{FETCH_EVERYTHING, SEARCH_RESULT_LIMIT};
use tracing::{debug, info};

/// Interpretation of a resolution identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every message in the channel.
    Everything,
    /// Explicit message ids, in the order given.
    Explicit(Vec<MessageId>),
    /// Full-text search query.
    Search(String),
}

impl Selector {
    /// Classify an identifier string.
    #[must_use]
    pub fn parse(identifier: &str) -> Self {
        if identifier == FETCH_EVERYTHING {
            return Self::Everything;
        }

        let tokens: Vec<&str> = identifier.split_whitespace().collect();
        if !tokens.is_empty() && tokens.iter().all(|t| t.bytes().all(|b| b.is_ascii_digit())) {
            let ids: Option<Vec<MessageId>> = tokens.iter().map(|t| t.parse().ok()).collect();
            if let Some(ids) = ids {
                return Self::Explicit(ids);
            }
        }

        Self::Search(identifier.to_string())
    }
}

/// Resolve `identifier` against `channel` into message ids, oldest first.
///
/// # Errors
///
/// Propagates channel errors from history iteration or search.
pub async fn resolve_message_ids<C: ChannelClient + ?Sized>(
    client: &C,
    channel: &C::Peer,
    identifier: &str,
) -> Result<Vec<MessageId>, ChannelError> {
    let ids = match Selector::parse(identifier) {
        Selector::Everything => {
            let mut ids = client.history_ids(channel).await?;
            ids.reverse();
            info!(count = ids.len(), "Resolved full channel history");
            ids
        }
        Selector::Explicit(mut ids) => {
            ids.sort_unstable();
            debug!(count = ids.len(), "Using explicit message ids");
            ids
        }
        Selector::Search(query) => {
            let mut ids = client
                .search_ids(channel, &query, SEARCH_RESULT_LIMIT)
                .await?;
            ids.truncate(SEARCH_RESULT_LIMIT);
            ids.reverse();
            info!(count = ids.len(), query = %query, "Resolved search results");
            ids
        }
    };
    Ok(ids)
}
