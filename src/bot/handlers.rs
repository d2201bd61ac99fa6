//! Update handlers: translate Telegram messages for the plugin chain.

use super::sink::TelegramSink;
use crate::plugin::{ContextType, HandleOutcome, IncomingMessage, PluginChain};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

/// View a Telegram message the way plugins see it.
///
/// Messages without text (voice, photos, stickers...) become `ContextType::Other`.
#[must_use]
pub fn incoming_from(msg: &Message) -> IncomingMessage {
    let (kind, content) = msg.text().map_or_else(
        || (ContextType::Other, String::new()),
        |text| (ContextType::Text, text.to_string()),
    );

    IncomingMessage {
        kind,
        content,
        is_group: msg.chat.is_group() || msg.chat.is_supergroup(),
    }
}

/// Offer a message to the plugin chain and deliver whatever it replies.
///
/// Plugin failures are turned into replies or logs inside the chain, so this never
/// fails the update.
///
/// # Errors
///
/// Never returns an error; the signature matches the dispatcher's endpoint type.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    chain: Arc<PluginChain>,
) -> ResponseResult<()> {
    let incoming = incoming_from(&msg);
    let sink = TelegramSink::new(bot, msg.chat.id);

    match chain.dispatch(&incoming, &sink).await {
        HandleOutcome::Handled => {
            info!(chat_id = msg.chat.id.0, group = incoming.is_group, "Request handled");
        }
        HandleOutcome::Ignored => {
            debug!(chat_id = msg.chat.id.0, "No plugin matched");
        }
    }

    respond(())
}
