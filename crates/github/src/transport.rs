//! HTTP access to the GitHub REST API.
//!
//! [`RestTransport`] is the seam between the adapter and the network: one
//! GET returning a JSON document. [`HttpTransport`] implements it with
//! `reqwest`; [`Retrying`] wraps any transport and re-issues requests whose
//! [`SourceError::retry_policy`] allows it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graph::{RetryPolicy, SourceError};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Media type requested on every call.
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Seam
// ---------------------------------------------------------------------------

/// A GET-only JSON transport.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Fetches `path` (relative to the API root, optionally with a query
    /// string) and returns the decoded body.
    async fn get_json(&self, path: &str) -> Result<Value, SourceError>;
}

#[async_trait]
impl<T: RestTransport + ?Sized> RestTransport for Arc<T> {
    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        (**self).get_json(path).await
    }
}

// ---------------------------------------------------------------------------
// reqwest transport
// ---------------------------------------------------------------------------

/// Authenticated `reqwest` client bound to one API root.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    /// Builds a transport for `base_url`. An empty token is treated as none.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("issue-graph/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// The API root requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        let mut request = self
            .client
            .get(self.url(path))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(API_VERSION_HEADER, API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| SourceError::Transport {
            path: path.to_string(),
            message: e.to_string(),
            retry_after: None,
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(path, status = status.as_u16(), "GitHub request failed");
            return Err(classify_status(status, response.headers(), path));
        }

        response.json::<Value>().await.map_err(|e| SourceError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// Maps a non-success response to a [`SourceError`].
///
/// 404 and 401 are final. A 403 is final too unless it carries rate-limit
/// signals, in which case it is retried like any other transport failure.
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap, path: &str) -> SourceError {
    let path = path.to_string();
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound { path },
        StatusCode::UNAUTHORIZED => SourceError::Unauthorized { path },
        StatusCode::FORBIDDEN if !is_rate_limited(headers) => SourceError::Unauthorized { path },
        _ => SourceError::Transport {
            path,
            message: format!("HTTP {status}"),
            retry_after: retry_after(headers),
        },
    }
}

fn is_rate_limited(headers: &HeaderMap) -> bool {
    headers.contains_key(RETRY_AFTER)
        || headers
            .get(RATE_LIMIT_REMAINING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

// ---------------------------------------------------------------------------
// Retry decorator
// ---------------------------------------------------------------------------

/// Attempt count and back-off for [`Retrying`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    /// Total attempts, including the first. Values below 1 act as 1.
    pub attempts: u32,
    /// Wait before the first retry; doubled for each later retry.
    pub base_delay: Duration,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetrySchedule {
    /// Back-off before retry number `retry` (zero-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Retries transient failures of an inner transport.
///
/// A server-supplied `Retry-After` is honoured when it is longer than the
/// scheduled back-off.
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    schedule: RetrySchedule,
}

impl<T> Retrying<T> {
    /// Wraps `inner` with the default schedule.
    pub fn new(inner: T) -> Self {
        Self::with_schedule(inner, RetrySchedule::default())
    }

    /// Wraps `inner` with an explicit schedule.
    pub fn with_schedule(inner: T, schedule: RetrySchedule) -> Self {
        Self { inner, schedule }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: RestTransport> RestTransport for Retrying<T> {
    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        let attempts = self.schedule.attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self.inner.get_json(path).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let wait = match error.retry_policy() {
                RetryPolicy::NonRetryable => return Err(error),
                RetryPolicy::Retryable { after } => {
                    let backoff = self.schedule.backoff(attempt - 1);
                    after.map_or(backoff, |after| after.max(backoff))
                }
            };
            if attempt >= attempts {
                warn!(path, attempts, %error, "GitHub request failed after retries");
                return Err(error);
            }

            debug!(
                path,
                attempt,
                wait_ms = wait.as_millis() as u64,
                %error,
                "Retrying GitHub request"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}
