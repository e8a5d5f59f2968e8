//! [`IssueSource`] implementation over the GitHub REST API.

use async_trait::async_trait;
use graph::{Comment, Issue, IssueSource, NodeKey, SourceError, TimelineEvent};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::transport::RestTransport;
use crate::wire::{CommentPayload, IssuePayload, TimelinePayload};

/// Page size requested from list endpoints. A shorter page ends pagination.
pub const PER_PAGE: usize = 100;

/// Reads issues, comments and timelines through a [`RestTransport`].
pub struct GitHubIssueSource<T> {
    transport: T,
}

impl<T: RestTransport> GitHubIssueSource<T> {
    /// Creates a source backed by `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn get<D: DeserializeOwned>(&self, path: &str) -> Result<D, SourceError> {
        let value = self.transport.get_json(path).await?;
        decode(path, value)
    }

    /// Follows `?per_page=..&page=..` until a page comes back short.
    async fn get_all_pages(&self, path: &str) -> Result<Vec<Value>, SourceError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let page_path = format!("{path}?per_page={PER_PAGE}&page={page}");
            let batch: Vec<Value> = self.get(&page_path).await?;
            let len = batch.len();
            items.extend(batch);
            if len < PER_PAGE {
                return Ok(items);
            }
            page += 1;
        }
    }
}

fn issue_path(key: &NodeKey) -> String {
    format!("repos/{}/issues/{}", key.repository, key.number)
}

fn decode<D: DeserializeOwned>(path: &str, value: Value) -> Result<D, SourceError> {
    serde_json::from_value(value).map_err(|e| SourceError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl<T: RestTransport> IssueSource for GitHubIssueSource<T> {
    async fn fetch_issue(&self, key: &NodeKey) -> Result<Issue, SourceError> {
        let payload: IssuePayload = self.get(&issue_path(key)).await?;
        Ok(payload.into_issue())
    }

    async fn fetch_comments(&self, key: &NodeKey) -> Result<Vec<Comment>, SourceError> {
        let path = format!("{}/comments", issue_path(key));
        let items = self.get_all_pages(&path).await?;
        let total = items.len();

        let comments: Vec<Comment> = items
            .into_iter()
            .filter_map(|item| match decode::<CommentPayload>(&path, item) {
                Ok(payload) => Some(payload.into_comment()),
                Err(error) => {
                    debug!(%error, "Skipping undecodable comment");
                    None
                }
            })
            .collect();
        debug!(issue = %key, total, count = comments.len(), "Fetched comments");
        Ok(comments)
    }

    async fn fetch_timeline(&self, key: &NodeKey) -> Result<Vec<TimelineEvent>, SourceError> {
        let path = format!("{}/timeline", issue_path(key));
        let items = self.get_all_pages(&path).await?;
        let total = items.len();

        // Timeline entries are heterogeneous; undecodable ones are skipped individually.
        let events: Vec<TimelineEvent> = items
            .into_iter()
            .filter_map(|item| match decode::<TimelinePayload>(&path, item) {
                Ok(payload) => payload.into_event(),
                Err(error) => {
                    debug!(%error, "Skipping undecodable timeline entry");
                    None
                }
            })
            .collect();
        debug!(issue = %key, total, linking = events.len(), "Fetched timeline");
        Ok(events)
    }
}
