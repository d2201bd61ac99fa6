//! Song writing through an OpenAI-compatible chat-completion API.
//!
//! `唱生日快乐歌` with prefix `唱` sends `生日快乐歌` as the user message, after the
//! configured system prompt, and replies with the cleaned-up completion.

use super::BUSY_REPLY;
use crate::config::{ChatSettings, DedupSettings};
use crate::format::format_reply;
use crate::plugin::{
    deliver_or_log, match_prefix, Admission, Clock, ContextType, HandleOutcome, IncomingMessage,
    Plugin, Reply, ReplySink, RequestGate, SystemClock,
};
use crate::remote::{
    extract_text, HttpTransport, RemoteClient, RemoteError, ReqwestTransport, RetryPolicy,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Chat-completion endpoint, relative to the API base.
pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Reply when every attempt failed at the transport level.
pub const RETRIES_EXHAUSTED_REPLY: &str = "请求失败，请稍后再试。";
/// Reply when the API answered without usable content.
pub const CREATION_FAILED_REPLY: &str = "创作过程中遇到了一些问题，请稍后再试。";

const CONTENT_PATH: &[&str] = &["choices", "0", "message", "content"];

/// Plugin answering trigger messages with a chat-completion reply.
pub struct ChatSongPlugin {
    settings: ChatSettings,
    client: RemoteClient,
    policy: RetryPolicy,
    gate: RequestGate,
}

impl ChatSongPlugin {
    /// Plugin priority; lower than the music plugin.
    pub const PRIORITY: i32 = 8;

    /// Create the plugin with an explicit transport and clock.
    #[must_use]
    pub fn new(
        settings: ChatSettings,
        dedup: &DedupSettings,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client = RemoteClient::new(transport, &settings.api_base, &settings.api_key);
        let policy = RetryPolicy::new(
            settings.max_retries,
            Duration::from_secs(settings.retry_delay_secs),
        );
        Self {
            gate: RequestGate::new(dedup, clock),
            settings,
            client,
            policy,
        }
    }

    /// Create the plugin with the production HTTP stack.
    #[must_use]
    pub fn from_settings(settings: ChatSettings, dedup: &DedupSettings) -> Self {
        let transport = ReqwestTransport::new(Duration::from_secs(settings.http_timeout_secs));
        Self::new(settings, dedup, Arc::new(transport), Arc::new(SystemClock))
    }

    fn build_payload(&self, user_message: &str) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": self.settings.system_prompt},
                {"role": "user", "content": user_message},
            ],
        })
    }

    async fn compose(&self, user_message: &str) -> Reply {
        let payload = self.build_payload(user_message);
        debug!(payload = %payload, "Sending chat payload");

        let content = self
            .client
            .post_json(CHAT_COMPLETIONS_PATH, &payload, &self.policy)
            .await
            .and_then(|body| extract_text(&body, CONTENT_PATH));

        match content {
            Ok(content) => {
                let cleaned = format_reply(&content);
                if cleaned.is_empty() {
                    error!("Chat completion was empty after cleanup");
                    Reply::Text(CREATION_FAILED_REPLY.to_string())
                } else {
                    Reply::Text(cleaned)
                }
            }
            Err(e @ RemoteError::Transport(_)) => {
                error!(error = %e, "Max retries exceeded");
                Reply::Text(RETRIES_EXHAUSTED_REPLY.to_string())
            }
            Err(e) => {
                error!(error = %e, "Chat completion failed");
                Reply::Text(CREATION_FAILED_REPLY.to_string())
            }
        }
    }

    fn accepts(&self, msg: &IncomingMessage) -> bool {
        msg.kind == ContextType::Text
            && self.settings.enabled
            && (!msg.is_group || self.settings.group)
    }
}

#[async_trait]
impl Plugin for ChatSongPlugin {
    fn name(&self) -> &'static str {
        "chat-song"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    #[instrument(skip_all, fields(plugin = "chat-song"))]
    async fn handle(&self, msg: &IncomingMessage, sink: &dyn ReplySink) -> HandleOutcome {
        if !self.accepts(msg) {
            return HandleOutcome::Ignored;
        }
        let Some(hit) = match_prefix(&msg.content, &self.settings.prefixes) else {
            return HandleOutcome::Ignored;
        };

        let key = msg.content.trim();
        if self.gate.admit(key).await == Admission::Duplicate {
            info!(prefix = hit.prefix, "Request already in progress");
            deliver_or_log(sink, self.name(), Reply::Text(BUSY_REPLY.to_string())).await;
            return HandleOutcome::Handled;
        }

        info!(prefix = hit.prefix, "Composing song");
        let reply = self.compose(hit.payload).await;
        self.gate.complete(key).await;

        deliver_or_log(sink, self.name(), reply).await;
        HandleOutcome::Handled
    }
}
