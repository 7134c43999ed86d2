//! Decoding of helper messages into relayable items.

use courier_runtime::{ContentItem, Inbound};
use teloxide::types::Message;

/// Decode a message from the helper identity.
///
/// Control lines are posted directly by the helper; anything carrying a
/// forward origin came from the source channel and is always content.
#[must_use]
pub fn decode_helper_message(msg: &Message) -> Inbound {
    let item = content_item(msg);
    if msg.forward_origin().is_some() {
        Inbound::from_forward(item)
    } else {
        Inbound::from_helper(item)
    }
}

/// Turn a message posted by the helper into a [`ContentItem`].
///
/// Priority: video, document (animations included), photo (largest size),
/// text. Captions are kept.
#[must_use]
pub fn content_item(msg: &Message) -> ContentItem {
    let caption = msg.caption().map(ToString::to_string);

    if let Some(video) = msg.video() {
        return ContentItem::Video {
            file_id: video.file.id.0.clone(),
            caption,
        };
    }
    if let Some(doc) = msg.document() {
        return ContentItem::Document {
            file_id: doc.file.id.0.clone(),
            caption,
        };
    }
    // GIFs travel as generic files
    if let Some(animation) = msg.animation() {
        return ContentItem::Document {
            file_id: animation.file.id.0.clone(),
            caption,
        };
    }
    if let Some(largest) = msg
        .photo()
        .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)))
    {
        return ContentItem::Photo {
            file_id: largest.file.id.0.clone(),
            caption,
        };
    }
    if let Some(text) = msg.text() {
        return ContentItem::Text {
            text: text.to_string(),
        };
    }

    ContentItem::Unsupported {
        kind: unsupported_kind(msg).to_string(),
    }
}

fn unsupported_kind(msg: &Message) -> &'static str {
    if msg.sticker().is_some() {
        "sticker"
    } else if msg.audio().is_some() {
        "audio"
    } else if msg.voice().is_some() {
        "voice"
    } else if msg.video_note().is_some() {
        "video note"
    } else {
        "message"
    }
}
