//! Configuration and settings management
//!
//! Settings are layered from `config/default`, `config/{RUN_MODE}`, `config/local`
//! and `SONG_RELAY__*` environment variables. Each plugin reads its own section so a
//! missing or broken section disables only that plugin.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable prefix, e.g. `SONG_RELAY__CHAT__API_KEY`.
pub const ENV_PREFIX: &str = "SONG_RELAY";

/// Default OpenAI-compatible API base for the chat-song plugin.
pub const DEFAULT_CHAT_API_BASE: &str = "https://api.openai.com/v1";

/// Keys that hold comma-separated lists when supplied through the environment.
const LIST_KEYS: &[&str] = &[
    "music.music_create_prefixes",
    "music.instrumental_create_prefixes",
    "music.lyrics_create_prefixes",
    "chat.prefixes",
];

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    let mut env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .try_parsing(true)
        .ignore_empty(true);
    for key in LIST_KEYS {
        env = env.with_list_parse_key(key);
    }

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(env)
        .build()
}

/// Telegram host settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token
    pub token: String,
}

impl TelegramSettings {
    /// Read the `[telegram]` section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the section or the token is missing.
    pub fn load(config: &Config) -> Result<Self, ConfigError> {
        config.get("telegram")
    }
}

/// Duplicate-request suppression settings shared by all plugins.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DedupSettings {
    /// Seconds an identical request text is rejected as already in flight
    #[serde(default = "default_dedup_window_secs")]
    pub window_secs: u64,
    /// Drop the entry as soon as the originating request completes.
    ///
    /// Only useful when the host runs updates from one chat concurrently; with
    /// sequential per-chat dispatch it lets a double-tap start a second generation.
    #[serde(default)]
    pub release_on_completion: bool,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            window_secs: default_dedup_window_secs(),
            release_on_completion: false,
        }
    }
}

impl DedupSettings {
    /// Read the `[dedup]` section, falling back to defaults when it is absent or invalid.
    #[must_use]
    pub fn load(config: &Config) -> Self {
        match config.get("dedup") {
            Ok(settings) => settings,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                warn!(error = %e, "Invalid [dedup] section, using defaults");
                Self::default()
            }
        }
    }

    /// Suppression window as a `Duration`.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Settings for the music/lyrics generation plugin.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MusicSettings {
    /// Whether the plugin is active
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the music service (without trailing path)
    pub api_base: String,
    /// Bearer token for the music service
    pub api_key: String,
    /// Model name sent with every request
    #[serde(default)]
    pub model: String,
    /// Prefixes that request a song with vocals
    #[serde(default)]
    pub music_create_prefixes: Vec<String>,
    /// Prefixes that request an instrumental track
    #[serde(default)]
    pub instrumental_create_prefixes: Vec<String>,
    /// Prefixes that request lyrics only
    #[serde(default)]
    pub lyrics_create_prefixes: Vec<String>,
    /// Directory generated audio is downloaded into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Send generated lyrics along with the audio
    #[serde(default = "default_true")]
    pub send_lyrics: bool,
    /// Send the cover image along with the audio
    #[serde(default = "default_true")]
    pub send_covers: bool,
    /// Respond in group chats
    #[serde(default = "default_true")]
    pub group: bool,
    /// Per-request HTTP timeout for generation calls
    #[serde(default = "default_music_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Total download attempts (first try included)
    #[serde(default = "default_download_max_attempts")]
    pub download_max_attempts: usize,
    /// Fixed pause between download attempts
    #[serde(default = "default_download_retry_delay_secs")]
    pub download_retry_delay_secs: u64,
    /// Wall-clock budget for the whole download
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl MusicSettings {
    /// Read the `[music]` section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the section or a required key is missing.
    pub fn load(config: &Config) -> Result<Self, ConfigError> {
        config.get("music")
    }
}

/// Settings for the chat-completion song plugin.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatSettings {
    /// Whether the plugin is active
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// OpenAI-compatible API base
    #[serde(default = "default_chat_api_base")]
    pub api_base: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Trigger prefixes
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// System prompt sent before the user's request
    #[serde(default)]
    pub system_prompt: String,
    /// Respond in group chats
    #[serde(default)]
    pub group: bool,
    /// Total attempts on transport failure
    #[serde(default = "default_chat_max_retries")]
    pub max_retries: usize,
    /// Fixed pause between attempts
    #[serde(default = "default_chat_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Per-request HTTP timeout
    #[serde(default = "default_chat_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl ChatSettings {
    /// Read the `[chat]` section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the section or a required key is missing.
    pub fn load(config: &Config) -> Result<Self, ConfigError> {
        config.get("chat")
    }
}

const fn default_true() -> bool {
    true
}

const fn default_dedup_window_secs() -> u64 {
    240
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

const fn default_music_http_timeout_secs() -> u64 {
    600
}

const fn default_download_max_attempts() -> usize {
    4
}

const fn default_download_retry_delay_secs() -> u64 {
    5
}

const fn default_download_timeout_secs() -> u64 {
    600
}

fn default_chat_api_base() -> String {
    DEFAULT_CHAT_API_BASE.to_string()
}

const fn default_chat_max_retries() -> usize {
    2
}

const fn default_chat_retry_delay_secs() -> u64 {
    210
}

const fn default_chat_http_timeout_secs() -> u64 {
    300
}
