//! Telegram host for the plugin chain

/// Update handlers
pub mod handlers;
/// Telegram operations with retry
pub mod resilient;
/// Reply delivery to a chat
pub mod sink;

pub use sink::TelegramSink;
