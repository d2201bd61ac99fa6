//! Song plugins
//!
//! Both plugins answer trigger-prefixed text messages; the music plugin is offered
//! messages first.

/// Song writing through a chat-completion API
pub mod chat_song;
/// Music, instrumental and lyrics generation
pub mod music;

pub use chat_song::ChatSongPlugin;
pub use music::MusicPlugin;

/// Reply when an identical request is still being processed.
pub const BUSY_REPLY: &str = "已经在拼命制作了...";
