/// Command, menu and helper-traffic handlers
pub mod handlers;
/// Helper message decoding
pub mod inbound;
/// Bot API implementation of the relay sink
pub mod relay_sink;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Unauthorized access flood protection
pub mod unauthorized_cache;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use relay_sink::TelegramSink;
pub use unauthorized_cache::UnauthorizedCache;
