//! Resilient messaging with automatic retry for Telegram API operations.
//!
//! Notices and menu edits go through
//! [`courier_core::utils::retry_transport_operation`], so a transient network
//! failure costs a short backoff instead of a lost message.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode};
use tracing::{debug, warn};

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    courier_core::utils::retry_transport_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message (and optionally its inline keyboard) with retry.
///
/// `Ok(None)` means Telegram reported the content as unchanged.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Option<Message>> {
    let text = text.into();
    courier_core::utils::retry_transport_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(kb) = markup.clone() {
            req = req.reply_markup(kb);
        }
        match req.await {
            Ok(msg) => Ok(Some(msg)),
            Err(e) if is_not_modified(&e.to_string()) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    })
    .await
}

/// Edit a status line, degrading to a log entry on failure.
///
/// Returns `false` if the edit failed after retries.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> bool {
    match edit_message_resilient(bot, chat_id, msg_id, text, None, None).await {
        Ok(Some(_)) => true,
        Ok(None) => {
            debug!("Message update skipped: message is not modified");
            true
        }
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Message update skipped: {err_msg}");
            } else {
                warn!("Failed to edit message after retries: {e}");
            }
            false
        }
    }
}

/// Telegram rejects edits that change nothing; treat them as success.
fn is_not_modified(err: &str) -> bool {
    err.to_lowercase().contains(ERROR_NOT_MODIFIED)
}

#[cfg(test)]
mod tests {
    use super::is_not_modified;

    #[test]
    fn test_not_modified_detection() {
        assert!(is_not_modified(
            "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
        ));
        assert!(is_not_modified("Message is not modified"));
        assert!(!is_not_modified("Bad Request: message to edit not found"));
    }
}
