//! Remote API access
//!
//! Generation services are plain JSON-over-HTTP endpoints. Requests go through an
//! injectable [`HttpTransport`] so plugins can be exercised without a network, and
//! every call is governed by an explicit [`RetryPolicy`].

mod client;
/// Streaming file downloads with retry and an overall deadline
pub mod fetch;
mod retry;
mod transport;

use thiserror::Error;

pub use client::{extract_text, RemoteClient};
pub use fetch::{DownloadError, Downloader, FileFetcher};
pub use retry::{with_retry, RetryPolicy};
pub use transport::{create_http_client, HttpReply, HttpTransport, ReqwestTransport};

#[cfg(test)]
pub use fetch::MockDownloader;
#[cfg(test)]
pub use transport::MockHttpTransport;

/// Errors that can occur while calling a remote API
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced an HTTP response (connect, TLS, timeout...)
    #[error("Network error: {0}")]
    Transport(String),
    /// The server answered with a non-success status
    #[error("API error: {status} - {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Cleaned-up response body
        message: String,
    },
    /// A success response without the expected content
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Whether another attempt could succeed.
    ///
    /// Only transport failures qualify; a well-formed error response is final.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
