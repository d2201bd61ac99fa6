//! Delivery of plugin replies to a Telegram chat.

use super::resilient::{send_audio_resilient, send_message_resilient, send_photo_resilient};
use crate::plugin::{Reply, ReplySink};
use crate::utils::split_message;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::debug;

/// Maximum message length for Telegram with safety margin.
/// The official limit is 4096 characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// [`ReplySink`] bound to the chat a message came from.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    /// Create a sink for `chat_id`.
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ReplySink for TelegramSink {
    async fn deliver(&self, reply: Reply) -> anyhow::Result<()> {
        match reply {
            Reply::Text(text) => {
                for part in split_message(&text, TELEGRAM_MESSAGE_LIMIT) {
                    send_message_resilient(&self.bot, self.chat_id, part).await?;
                }
            }
            Reply::Audio(path) => {
                debug!(chat_id = self.chat_id.0, path = %path.display(), "Uploading audio");
                send_audio_resilient(&self.bot, self.chat_id, &path).await?;
            }
            Reply::ImageUrl(url) => {
                send_photo_resilient(&self.bot, self.chat_id, &url).await?;
            }
        }
        Ok(())
    }
}
