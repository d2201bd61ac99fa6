//! Telegram sends with automatic retry on transient failures.
//!
//! Every operation is retried with exponential backoff and jitter, so a flaky
//! connection to the Bot API does not drop a song that took minutes to generate.

use anyhow::Result;
use reqwest::Url;
use std::path::Path;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, Message};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Retries after the first failed attempt.
pub const TELEGRAM_API_MAX_RETRIES: usize = 4;
/// First backoff step in milliseconds.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for a single backoff step in milliseconds.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 10_000;

/// Delays between Telegram retries: 500ms, 1s, 2s, 4s with jitter.
fn backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(TELEGRAM_API_INITIAL_BACKOFF_MS / 2)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES)
}

/// Retries a Telegram operation on failure.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
///
/// # Examples
///
/// ```
/// use song_relay::bot::resilient::retry_telegram_operation;
///
/// # async fn example() -> anyhow::Result<()> {
/// let value = retry_telegram_operation(|| async { Ok::<_, anyhow::Error>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    Retry::spawn(backoff(), operation).await.map_err(|e| {
        warn!(
            attempts = TELEGRAM_API_MAX_RETRIES + 1,
            error = %e,
            "Telegram API operation failed"
        );
        e
    })
}

/// Send a plain text message.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Upload a local audio file.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_audio_resilient(bot: &Bot, chat_id: ChatId, path: &Path) -> Result<Message> {
    retry_telegram_operation(|| async {
        bot.send_audio(chat_id, InputFile::file(path))
            .await
            .map_err(|e| anyhow::anyhow!("Telegram audio upload error: {e}"))
    })
    .await
}

/// Send a photo by URL; Telegram fetches it.
///
/// # Errors
///
/// Returns an error if `url` is invalid or after all retries are exhausted.
pub async fn send_photo_resilient(bot: &Bot, chat_id: ChatId, url: &str) -> Result<Message> {
    let url = Url::parse(url)?;
    retry_telegram_operation(|| async {
        bot.send_photo(chat_id, InputFile::url(url.clone()))
            .await
            .map_err(|e| anyhow::anyhow!("Telegram photo send error: {e}"))
    })
    .await
}
