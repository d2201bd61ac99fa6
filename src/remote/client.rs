//! JSON API client shared by the plugins.

use super::retry::{with_retry, RetryPolicy};
use super::transport::{HttpReply, HttpTransport};
use super::RemoteError;
use crate::utils::truncate_str;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Longest error body kept in a `RemoteError::Status` message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client bound to one API base URL and key.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
}

impl RemoteClient {
    /// Create a client; a trailing `/` on `base_url` is ignored.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Full URL for `path`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST `payload` to `path` and return the parsed JSON body.
    ///
    /// Transport failures are retried according to `policy`; error statuses and
    /// unparsable bodies are returned right away.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` once retries are exhausted,
    /// `RemoteError::Status` on a non-success status, or `RemoteError::Malformed` if
    /// the body is not JSON.
    pub async fn post_json(
        &self,
        path: &str,
        payload: &Value,
        policy: &RetryPolicy,
    ) -> Result<Value, RemoteError> {
        let url = self.endpoint(path);
        let url = url.as_str();
        trace!(url, payload = %payload, "Sending request");

        with_retry(
            policy,
            path,
            |attempt| async move {
                debug!(url, attempt, "POST");
                let reply = self.transport.post_json(url, &self.api_key, payload).await?;
                parse_reply(reply)
            },
            RemoteError::is_transient,
        )
        .await
    }
}

/// Check the status and parse the body of a response.
fn parse_reply(reply: HttpReply) -> Result<Value, RemoteError> {
    if !reply.is_success() {
        return Err(RemoteError::Status {
            status: reply.status,
            message: clean_error_body(&reply.body),
        });
    }

    serde_json::from_str(&reply.body).map_err(|e| RemoteError::Malformed(e.to_string()))
}

/// Summarize an error body for logs: HTML pages are dropped, long text truncated.
fn clean_error_body(body: &str) -> String {
    let trimmed = body.trim_start();
    // Nginx and other proxies answer with HTML pages
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        "(Server returned HTML error page)".to_string()
    } else if body.chars().count() > MAX_ERROR_BODY_CHARS {
        format!("{}... (truncated)", truncate_str(body, MAX_ERROR_BODY_CHARS))
    } else {
        body.to_string()
    }
}

/// Extracts a string from a JSON value by navigating a path.
///
/// Numeric segments index into arrays, other segments are object keys.
///
/// # Example
/// ```
/// use serde_json::json;
/// use song_relay::remote::extract_text;
///
/// let body = json!({"choices": [{"message": {"content": "hi"}}]});
/// let content = extract_text(&body, &["choices", "0", "message", "content"]).expect("content");
/// assert_eq!(content, "hi");
/// ```
///
/// # Errors
///
/// Returns `RemoteError::Malformed` if the path is missing or does not end at a string.
pub fn extract_text(value: &Value, path: &[&str]) -> Result<String, RemoteError> {
    let mut current = value;

    for segment in path {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index),
            Err(_) => current.get(*segment),
        }
        .ok_or_else(|| RemoteError::Malformed(format!("missing `{segment}` in response")))?;
    }

    current
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| RemoteError::Malformed(format!("expected string, got: {current}")))
}
