//! Music generation through a Suno-style HTTP service.
//!
//! Three trigger sets select the task: a song with vocals, an instrumental track, or
//! lyrics only. A song prompt that mentions both `标题` and `风格` is read as a custom
//! request:
//!
//! ```text
//! 标题：夏日海风
//! 风格：city pop, female vocals
//! 海浪轻轻拍打着……
//! ```
//!
//! Everything else is sent as a free-text description. Generation is attempted once;
//! only the audio download is retried.

use super::BUSY_REPLY;
use crate::config::{DedupSettings, MusicSettings};
use crate::format::format_reply;
use crate::plugin::{
    deliver_or_log, match_prefix, Admission, Clock, ContextType, HandleOutcome, IncomingMessage,
    Plugin, PrefixMatch, Reply, ReplySink, RequestGate, SystemClock,
};
use crate::remote::{
    extract_text, Downloader, FileFetcher, HttpTransport, RemoteClient, RemoteError,
    ReqwestTransport, RetryPolicy,
};
use crate::utils::{sanitize_filename, DEFAULT_FILE_STEM};
use async_trait::async_trait;
use lazy_regex::lazy_regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Music endpoint, relative to the API base.
pub const GENERATE_MUSIC_PATH: &str = "/generate_music";
/// Lyrics endpoint, relative to the API base.
pub const GENERATE_LYRICS_PATH: &str = "/generate_lyrics";

/// Reply when music generation failed.
pub const MUSIC_FAILED_REPLY: &str = "音乐生成失败，请稍后再试。";
/// Reply when lyrics generation failed.
pub const LYRICS_FAILED_REPLY: &str = "歌词生成失败，请稍后再试。";
/// Reply to a custom request that does not follow the expected layout.
pub const CUSTOM_FORMAT_HINT: &str =
    "自定义模式格式不正确，请按以下格式发送：\n标题：歌曲名称\n风格：音乐风格\n歌词（可选）";

/// Custom request: title line, style line, optional lyrics.
static RE_CUSTOM_PROMPT: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"(?s)^ *标题[:：]?(?P<title>[\S ]*)\n+ *风格[:：]?(?P<tags>[\S ]*)(?:\n+(?P<lyrics>.*))?$"
);

/// What a trigger asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Song,
    Instrumental,
    Lyrics,
}

impl Task {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Instrumental => "instrumental",
            Self::Lyrics => "lyrics",
        }
    }
}

/// Explicit title, style tags and lyrics.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CustomSong {
    title: String,
    tags: String,
    lyrics: String,
}

/// Whether a song prompt is meant as a custom request.
fn is_custom_prompt(prompt: &str) -> bool {
    prompt.contains("标题") && prompt.contains("风格")
}

fn parse_custom_prompt(prompt: &str) -> Option<CustomSong> {
    let caps = RE_CUSTOM_PROMPT.captures(prompt)?;
    let field = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    Some(CustomSong {
        title: field("title"),
        tags: field("tags"),
        lyrics: field("lyrics"),
    })
}

/// Successful `/generate_music` body.
#[derive(Debug, Deserialize)]
struct GeneratedMusic {
    #[serde(default)]
    music_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    lyrics: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

fn download_failed_reply(music_url: &str) -> String {
    format!("音乐已生成，但文件下载失败，可以直接访问：{music_url}")
}

/// Plugin generating songs, instrumentals and lyrics.
pub struct MusicPlugin {
    settings: MusicSettings,
    client: RemoteClient,
    downloader: Arc<dyn Downloader>,
    gate: RequestGate,
}

impl MusicPlugin {
    /// Plugin priority; offered messages before the chat-song plugin.
    pub const PRIORITY: i32 = 99;

    /// Create the plugin with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the output directory cannot be created.
    pub fn new(
        settings: MusicSettings,
        dedup: &DedupSettings,
        transport: Arc<dyn HttpTransport>,
        downloader: Arc<dyn Downloader>,
        clock: Arc<dyn Clock>,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&settings.output_dir)?;
        info!(dir = %settings.output_dir.display(), "Music output directory ready");

        let client = RemoteClient::new(transport, &settings.api_base, &settings.api_key);
        Ok(Self {
            gate: RequestGate::new(dedup, clock),
            settings,
            client,
            downloader,
        })
    }

    /// Create the plugin with the production HTTP stack.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the output directory cannot be created.
    pub fn from_settings(settings: MusicSettings, dedup: &DedupSettings) -> std::io::Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(settings.http_timeout_secs));
        let fetcher = FileFetcher::new(
            RetryPolicy::new(
                settings.download_max_attempts,
                Duration::from_secs(settings.download_retry_delay_secs),
            ),
            Duration::from_secs(settings.download_timeout_secs),
        );
        Self::new(
            settings,
            dedup,
            Arc::new(transport),
            Arc::new(fetcher),
            Arc::new(SystemClock),
        )
    }

    /// Find the task and trigger; song prefixes win over instrumental, then lyrics.
    fn classify<'a>(&'a self, content: &'a str) -> Option<(Task, PrefixMatch<'a>)> {
        [
            (Task::Song, &self.settings.music_create_prefixes[..]),
            (Task::Instrumental, &self.settings.instrumental_create_prefixes[..]),
            (Task::Lyrics, &self.settings.lyrics_create_prefixes[..]),
        ]
        .into_iter()
        .find_map(|(task, prefixes)| match_prefix(content, prefixes).map(|hit| (task, hit)))
    }

    fn accepts(&self, msg: &IncomingMessage) -> bool {
        msg.kind == ContextType::Text
            && self.settings.enabled
            && (!msg.is_group || self.settings.group)
    }

    async fn create_lyrics(&self, prompt: &str) -> Reply {
        let payload = json!({
            "model": self.settings.model,
            "prompt": prompt,
        });

        let lyrics = self
            .client
            .post_json(GENERATE_LYRICS_PATH, &payload, &RetryPolicy::single())
            .await
            .and_then(|body| extract_text(&body, &["lyrics"]))
            .map(|lyrics| format_reply(&lyrics));

        match lyrics {
            Ok(lyrics) if !lyrics.is_empty() => Reply::Text(lyrics),
            Ok(_) => {
                error!("Lyrics not found in response");
                Reply::Text(LYRICS_FAILED_REPLY.to_string())
            }
            Err(e) => {
                error!(error = %e, "Failed to generate lyrics");
                Reply::Text(LYRICS_FAILED_REPLY.to_string())
            }
        }
    }

    fn music_payload(&self, prompt: &str, instrumental: bool) -> Option<Value> {
        if !is_custom_prompt(prompt) {
            return Some(json!({
                "model": self.settings.model,
                "prompt": prompt,
                "make_instrumental": instrumental,
            }));
        }

        let song = parse_custom_prompt(prompt)?;
        Some(json!({
            "model": self.settings.model,
            "title": song.title,
            "tags": song.tags,
            "lyrics": song.lyrics,
            "make_instrumental": instrumental,
        }))
    }

    async fn create_music(&self, prompt: &str, instrumental: bool) -> Vec<Reply> {
        let Some(payload) = self.music_payload(prompt, instrumental) else {
            warn!("Invalid custom mode input format");
            return vec![Reply::Text(CUSTOM_FORMAT_HINT.to_string())];
        };

        let generated = self
            .client
            .post_json(GENERATE_MUSIC_PATH, &payload, &RetryPolicy::single())
            .await
            .and_then(|body| {
                serde_json::from_value::<GeneratedMusic>(body)
                    .map_err(|e| RemoteError::Malformed(e.to_string()))
            });

        let generated = match generated {
            Ok(generated) => generated,
            Err(e) => {
                error!(error = %e, "Failed to generate music");
                return vec![Reply::Text(MUSIC_FAILED_REPLY.to_string())];
            }
        };

        let Some(music_url) = generated.music_url.filter(|url| !url.is_empty()) else {
            error!("Music URL not found in response");
            return vec![Reply::Text(MUSIC_FAILED_REPLY.to_string())];
        };

        let stem = sanitize_filename(generated.title.as_deref().unwrap_or(DEFAULT_FILE_STEM));
        let path = self.settings.output_dir.join(format!("{stem}.mp3"));

        let mut replies = Vec::with_capacity(3);
        match self.downloader.download(&music_url, &path).await {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "Music ready");
                replies.push(Reply::Audio(path));
            }
            Err(e) => {
                warn!(url = %music_url, error = %e, "Music download failed");
                replies.push(Reply::Text(download_failed_reply(&music_url)));
            }
        }

        if self.settings.send_lyrics {
            if let Some(lyrics) = generated.lyrics.as_deref().map(format_reply) {
                if !lyrics.is_empty() {
                    replies.push(Reply::Text(lyrics));
                }
            }
        }
        if self.settings.send_covers {
            if let Some(cover) = generated.image_url.filter(|url| !url.is_empty()) {
                replies.push(Reply::ImageUrl(cover));
            }
        }

        replies
    }
}

#[async_trait]
impl Plugin for MusicPlugin {
    fn name(&self) -> &'static str {
        "music"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    #[instrument(skip_all, fields(plugin = "music"))]
    async fn handle(&self, msg: &IncomingMessage, sink: &dyn ReplySink) -> HandleOutcome {
        if !self.accepts(msg) {
            return HandleOutcome::Ignored;
        }
        let Some((task, hit)) = self.classify(&msg.content) else {
            return HandleOutcome::Ignored;
        };

        let key = msg.content.trim();
        if self.gate.admit(key).await == Admission::Duplicate {
            info!(task = task.as_str(), "Request already in progress");
            deliver_or_log(sink, self.name(), Reply::Text(BUSY_REPLY.to_string())).await;
            return HandleOutcome::Handled;
        }

        info!(task = task.as_str(), prefix = hit.prefix, "Generating");
        let replies = match task {
            Task::Lyrics => vec![self.create_lyrics(hit.payload).await],
            Task::Song => self.create_music(hit.payload, false).await,
            Task::Instrumental => self.create_music(hit.payload, true).await,
        };
        self.gate.complete(key).await;

        for reply in replies {
            deliver_or_log(sink, self.name(), reply).await;
        }
        HandleOutcome::Handled
    }
}
