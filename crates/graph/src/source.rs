//! The upstream data port.
//!
//! [`IssueSource`] is the only way the traversal reaches the issue tracker.
//! Infrastructure crates implement it (see the `github` crate); tests
//! implement it in memory. Implementations are expected to retry transient
//! failures themselves, so every error returned here is final for that call.

use async_trait::async_trait;

use crate::{Comment, Issue, NodeKey, SourceError, TimelineEvent};

/// Read access to issues, their comments, and their linking timeline.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetches the issue identified by `key`.
    async fn fetch_issue(&self, key: &NodeKey) -> Result<Issue, SourceError>;

    /// Fetches every discussion comment on `key`, oldest first.
    async fn fetch_comments(&self, key: &NodeKey) -> Result<Vec<Comment>, SourceError>;

    /// Fetches the linking events on `key`'s timeline, in upstream order.
    ///
    /// Only events that record a source issue are returned.
    async fn fetch_timeline(&self, key: &NodeKey) -> Result<Vec<TimelineEvent>, SourceError>;
}
