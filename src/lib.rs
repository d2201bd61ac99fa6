#![deny(missing_docs)]
//! Song relay library.
//!
//! Chat plugins that forward trigger-prefixed prompts to music-generation and
//! chat-completion APIs and relay the results back to the conversation.

/// Telegram host adapter.
pub mod bot;
/// Configuration management.
pub mod config;
/// Reply text cleanup.
pub mod format;
/// Plugin contract, prefix matching and request deduplication.
pub mod plugin;
/// Concrete plugins.
pub mod plugins;
/// Remote API calls, retries and file downloads.
pub mod remote;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
