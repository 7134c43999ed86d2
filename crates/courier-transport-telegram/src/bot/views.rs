//! View layer for bot UI components
//!
//! Menu keyboards and the fixed texts shown to requesters.

use courier_core::menu::{menu_title, MenuEntry};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Reply to users outside the allow-list.
pub const ACCESS_DENIED: &str = "⛔️ Access denied";
/// Callback data outside the menu grammar.
pub const INVALID_OPTION: &str = "⚠️ Invalid option selected.";
/// Button pointing to an action missing from the action table.
pub const ACTION_NOT_CONFIGURED: &str = "⚠️ Selected action is not configured.";
/// The bot account has no public username to hand to the helper.
pub const NEED_USERNAME: &str = "⚠️ Bot error: I need a username.";
/// The bot could not prepare a request (e.g. its own account lookup failed).
pub const UNEXPECTED_ERROR: &str = "🚨 Unexpected bot error.";

/// Menu message text (HTML).
#[must_use]
pub fn menu_text(menu_id: &str) -> String {
    format!(
        "📜 {}\nSelect an option:",
        html_escape::encode_text(&menu_title(menu_id))
    )
}

/// One button per row, in file order.
#[must_use]
pub fn menu_keyboard(entries: &[MenuEntry]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(entries.iter().map(|entry| {
        vec![InlineKeyboardButton::callback(
            entry.label.clone(),
            entry.callback.clone(),
        )]
    }))
}
