use config::Config;
use dotenvy::dotenv;
use regex::Regex;
use song_relay::bot::handlers::handle_message;
use song_relay::config::{build_config, ChatSettings, DedupSettings, MusicSettings, TelegramSettings};
use song_relay::plugin::PluginChain;
use song_relay::plugins::{ChatSongPlugin, MusicPlugin};
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    telegram_url: Regex,
    telegram_token: Regex,
    bot_prefix: Regex,
    bearer: Regex,
    api_key: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            telegram_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            telegram_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            bot_prefix: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            api_key: Regex::new(r"\bsk-[A-Za-z0-9_-]{8,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self
            .telegram_url
            .replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self
            .telegram_token
            .replace_all(&output, "[TELEGRAM_TOKEN]");
        let output = self.bot_prefix.replace_all(&output, "$1[TELEGRAM_TOKEN]");
        let output = self.bearer.replace_all(&output, "$1[MASKED]");
        self.api_key.replace_all(&output, "[API_KEY]").into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Compile redaction patterns before any log line is written
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting song-relay...");

    let config = build_config().map_err(|e| {
        error!(error = %e, "Failed to read configuration");
        e
    })?;
    let telegram = TelegramSettings::load(&config).map_err(|e| {
        error!(error = %e, "Telegram token is not configured");
        e
    })?;

    let chain = Arc::new(init_plugins(&config));
    if chain.is_empty() {
        warn!("No plugin is enabled; the bot will ignore every message");
    }

    let bot = Bot::new(telegram.token);
    let handler = Update::filter_message().endpoint(handle_message);

    info!(plugins = chain.len(), "Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![chain])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

/// Build the plugin chain; a plugin whose section is missing or broken stays inert.
fn init_plugins(config: &Config) -> PluginChain {
    let dedup = DedupSettings::load(config);
    info!(
        window_secs = dedup.window_secs,
        release_on_completion = dedup.release_on_completion,
        "Duplicate suppression configured"
    );

    let mut chain = PluginChain::new();

    match MusicSettings::load(config) {
        Ok(settings) if settings.enabled => match MusicPlugin::from_settings(settings, &dedup) {
            Ok(plugin) => {
                chain.register(Arc::new(plugin));
                info!("Music plugin initialized.");
            }
            Err(e) => error!(error = %e, "Music plugin init failed"),
        },
        Ok(_) => info!("Music plugin disabled."),
        Err(e) => warn!(error = %e, "Music plugin not configured"),
    }

    match ChatSettings::load(config) {
        Ok(settings) if settings.enabled => {
            chain.register(Arc::new(ChatSongPlugin::from_settings(settings, &dedup)));
            info!("Chat-song plugin initialized.");
        }
        Ok(_) => info!("Chat-song plugin disabled."),
        Err(e) => warn!(error = %e, "Chat-song plugin not configured"),
    }

    chain
}
