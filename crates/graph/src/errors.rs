//! Error and retry-policy types for the issue reference graph domain.
//!
//! [`SourceError`] covers failures of the upstream [`crate::IssueSource`]. It
//! is `Clone` because a single timeline fetch result is handed to every caller
//! waiting on that fetch.
//!
//! [`TraversalError`] covers conditions that abort a whole traversal run. A
//! failure confined to one node never becomes a [`TraversalError`]; the node
//! is pruned and traversal continues.
//!
//! [`RetryPolicy`] is a cross-cutting concern: transports consult
//! [`SourceError::retry_policy`] to decide whether to re-issue a request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NodeKey;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Upstream errors
// ---------------------------------------------------------------------------

/// Failure of a single upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The requested resource does not exist (HTTP 404 or equivalent).
    #[error("Not found: {path}")]
    NotFound {
        /// Path that was requested.
        path: String,
    },

    /// Credentials were missing or rejected.
    #[error("Unauthorized: {path}")]
    Unauthorized {
        /// Path that was requested.
        path: String,
    },

    /// The request could not be completed (connection error, 5xx, rate limit).
    #[error("Transport failure for {path}: {message}")]
    Transport {
        /// Path that was requested.
        path: String,
        /// Human-readable cause.
        message: String,
        /// Server-suggested wait before retrying, if any.
        retry_after: Option<Duration>,
    },

    /// The response arrived but could not be decoded.
    #[error("Could not decode response for {path}: {message}")]
    Decode {
        /// Path that was requested.
        path: String,
        /// Human-readable cause.
        message: String,
    },

    /// The fetch was abandoned because the traversal was cancelled.
    #[error("Fetch cancelled")]
    Cancelled,
}

impl SourceError {
    /// Returns whether a transport should retry the failed request.
    ///
    /// Missing resources, rejected credentials, undecodable payloads and
    /// cancellation are final; only transport failures are retried.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            SourceError::Transport { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            SourceError::NotFound { .. }
            | SourceError::Unauthorized { .. }
            | SourceError::Decode { .. }
            | SourceError::Cancelled => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a traversal run.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// A seed issue could not be fetched, so there is nothing to traverse.
    #[error("Seed {seed} could not be fetched: {source}")]
    SeedUnavailable {
        /// The seed that failed.
        seed: NodeKey,
        /// Underlying fetch failure.
        #[source]
        source: SourceError,
    },

    /// The traversal configuration is invalid.
    ///
    /// Produced before any fetch is issued; a run never starts with an
    /// invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The run was cancelled before it completed.
    #[error("Traversal cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        let transport = SourceError::Transport {
            path: "repos/a/b/issues/1".into(),
            message: "502 Bad Gateway".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            transport.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2))
            }
        );

        let not_found = SourceError::NotFound {
            path: "repos/a/b/issues/1".into(),
        };
        assert_eq!(not_found.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(SourceError::Cancelled.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn seed_error_names_the_seed() {
        let err = TraversalError::SeedUnavailable {
            seed: "r1/r1#1".parse().unwrap(),
            source: SourceError::Unauthorized {
                path: "repos/r1/r1/issues/1".into(),
            },
        };
        assert!(err.to_string().contains("r1/r1#1"));
    }
}
