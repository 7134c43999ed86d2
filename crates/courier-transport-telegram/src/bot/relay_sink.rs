//! Telegram side of the relay: re-sends helper items by file id.

use crate::bot::resilient::send_message_resilient;
use async_trait::async_trait;
use courier_runtime::{ContentItem, RelaySink, RequesterId, SinkError};
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};

/// Delivers items and notices through the Bot API.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    /// Sink sending through `bot`.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn file(file_id: &str) -> InputFile {
    InputFile::file_id(FileId(file_id.to_string()))
}

fn transport(e: teloxide::RequestError) -> SinkError {
    SinkError::Transport(e.to_string())
}

#[async_trait]
impl RelaySink for TelegramSink {
    async fn relay(&self, requester: RequesterId, item: &ContentItem) -> Result<(), SinkError> {
        let chat_id = ChatId(requester.0);
        match item {
            ContentItem::Video { file_id, caption } => {
                let mut req = self.bot.send_video(chat_id, file(file_id));
                if let Some(c) = caption {
                    req = req.caption(c.clone());
                }
                req.await.map_err(transport)?;
            }
            ContentItem::Document { file_id, caption } => {
                let mut req = self.bot.send_document(chat_id, file(file_id));
                if let Some(c) = caption {
                    req = req.caption(c.clone());
                }
                req.await.map_err(transport)?;
            }
            ContentItem::Photo { file_id, caption } => {
                let mut req = self.bot.send_photo(chat_id, file(file_id));
                if let Some(c) = caption {
                    req = req.caption(c.clone());
                }
                req.await.map_err(transport)?;
            }
            ContentItem::Text { text } => {
                self.bot
                    .send_message(chat_id, text.clone())
                    .await
                    .map_err(transport)?;
            }
            ContentItem::Unsupported { kind } => {
                return Err(SinkError::Unsupported(kind.clone()));
            }
        }
        Ok(())
    }

    async fn notify(&self, requester: RequesterId, text: &str) -> Result<(), SinkError> {
        send_message_resilient(&self.bot, ChatId(requester.0), text, None)
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}
