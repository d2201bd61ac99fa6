//! Downloads of generated files.
//!
//! The body is streamed into `<destination>.part` and renamed over the destination
//! only once complete, so a failed or timed-out download never leaves a file that
//! looks finished. The content itself is not verified.

use super::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client as HttpClient;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// Errors that can occur while downloading a file
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a non-success status
    #[error("download failed with status {0}")]
    Status(u16),
    /// The request or the body stream failed
    #[error("network error: {0}")]
    Transport(String),
    /// Writing the file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The overall deadline passed before a download completed
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
}

/// Saves a remote file to local disk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `destination`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError>;
}

/// Streams remote files to disk with retries and an overall deadline.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: HttpClient,
    policy: RetryPolicy,
    timeout: Duration,
}

impl FileFetcher {
    /// Create a fetcher.
    ///
    /// `timeout` bounds the whole download, retries and pauses included.
    #[must_use]
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self::with_client(HttpClient::new(), policy, timeout)
    }

    /// Create a fetcher on an existing client.
    #[must_use]
    pub const fn with_client(client: HttpClient, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            client,
            policy,
            timeout,
        }
    }

    async fn fetch_once(&self, url: &str, partial: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Transport(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl Downloader for FileFetcher {
    /// Fails with `DownloadError::Timeout` when the deadline passes, even if attempts
    /// remain, otherwise with the error of the last attempt.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let partial = partial_path(destination);
        let partial = partial.as_path();

        let attempts = with_retry(
            &self.policy,
            "download",
            |attempt| async move {
                debug!(url, attempt, "Downloading file");
                let result = self.fetch_once(url, partial).await;
                if result.is_err() {
                    discard(partial).await;
                }
                result
            },
            |_| true,
        );

        match tokio::time::timeout(self.timeout, attempts).await {
            Ok(Ok(bytes)) => {
                if let Err(e) = tokio::fs::rename(partial, destination).await {
                    discard(partial).await;
                    error!(
                        url,
                        path = %destination.display(),
                        error = %e,
                        "Could not move download into place"
                    );
                    return Err(e.into());
                }
                info!(url, path = %destination.display(), bytes, "File downloaded");
                Ok(bytes)
            }
            Ok(Err(e)) => {
                error!(url, error = %e, "File download failed");
                Err(e)
            }
            Err(_) => {
                discard(partial).await;
                error!(url, timeout_secs = self.timeout.as_secs(), "File download timed out");
                Err(DownloadError::Timeout(self.timeout))
            }
        }
    }
}

/// `<destination>.part`
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

async fn discard(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %partial.display(), error = %e, "Could not remove partial download");
        }
    }
}
