//! Plugin contract between the chat host and the song plugins.
//!
//! The host turns each incoming update into an [`IncomingMessage`] and hands it to
//! the [`PluginChain`]. Plugins answer through a [`ReplySink`], so they never see
//! the concrete chat transport.

/// Time-windowed duplicate request suppression
pub mod dedup;
/// Trigger prefix matching
pub mod prefix;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub use dedup::{Admission, Clock, Deduplicator, RequestGate, SystemClock};
pub use prefix::{match_prefix, PrefixMatch};

/// Kind of content carried by an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    /// Plain text
    Text,
    /// Anything else (voice, photo, stickers...)
    Other,
}

/// A message as seen by the plugins.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Content kind; only `Text` is processed
    pub kind: ContextType,
    /// Raw message text
    pub content: String,
    /// Whether the message was posted in a group chat
    pub is_group: bool,
}

impl IncomingMessage {
    /// Create a private text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ContextType::Text,
            content: content.into(),
            is_group: false,
        }
    }

    /// Mark the message as coming from a group chat.
    #[must_use]
    pub const fn in_group(mut self) -> Self {
        self.is_group = true;
        self
    }
}

/// A reply produced by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text message
    Text(String),
    /// Audio file on local disk
    Audio(PathBuf),
    /// Remote image, e.g. a generated cover
    ImageUrl(String),
}

/// Delivers replies back to the originating conversation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Deliver a single reply.
    async fn deliver(&self, reply: Reply) -> anyhow::Result<()>;
}

/// Result of offering a message to a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The message was not meant for this plugin
    Ignored,
    /// The plugin consumed the message; later plugins are skipped
    Handled,
}

/// A message handler registered with the host.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Higher priorities are offered messages first.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect a message and optionally reply to it.
    async fn handle(&self, msg: &IncomingMessage, sink: &dyn ReplySink) -> HandleOutcome;
}

/// Deliver a reply, logging instead of propagating failures.
pub async fn deliver_or_log(sink: &dyn ReplySink, plugin: &str, reply: Reply) {
    if let Err(e) = sink.deliver(reply).await {
        warn!(plugin = plugin, error = %e, "Failed to deliver reply");
    }
}

/// Ordered set of plugins; the first one to handle a message wins.
#[derive(Default, Clone)]
pub struct PluginChain {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, keeping the chain sorted by descending priority.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
        // Stable: equal priorities keep registration order
        self.plugins.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Offer a message to each plugin until one handles it.
    pub async fn dispatch(&self, msg: &IncomingMessage, sink: &dyn ReplySink) -> HandleOutcome {
        for plugin in &self.plugins {
            if plugin.handle(msg, sink).await == HandleOutcome::Handled {
                debug!(plugin = plugin.name(), "Message handled");
                return HandleOutcome::Handled;
            }
        }
        HandleOutcome::Ignored
    }
}
