//! In-memory issue tracker for traversal tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use graph::{
    Comment, CommentId, Issue, IssueNumber, IssueSource, NodeKey, RepositoryId, SourceError,
    TimelineEvent, Timestamp,
};
use parking_lot::Mutex;

pub fn key(s: &str) -> NodeKey {
    s.parse().expect("test node key")
}

pub fn ts(s: &str) -> Option<Timestamp> {
    Timestamp::parse_rfc3339(s)
}

/// Canned issues, comments and timelines with per-key call counters.
///
/// Unknown issues fail with `NotFound`; unknown comment and timeline lists
/// are empty.
#[derive(Default)]
pub struct FakeTracker {
    issues: HashMap<NodeKey, String>,
    comments: HashMap<NodeKey, Vec<Comment>>,
    timelines: HashMap<NodeKey, Vec<TimelineEvent>>,
    broken_timelines: Vec<NodeKey>,
    timeline_delay: Option<Duration>,
    issue_calls: Mutex<HashMap<NodeKey, usize>>,
    comment_calls: Mutex<HashMap<NodeKey, usize>>,
    timeline_calls: Mutex<HashMap<NodeKey, usize>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(mut self, at: &str, body: &str) -> Self {
        self.issues.insert(key(at), body.to_string());
        self
    }

    pub fn comment(mut self, at: &str, id: u64, author: &str, body: &str, created: &str) -> Self {
        self.comments.entry(key(at)).or_default().push(Comment {
            id: CommentId::new(id),
            author: Some(author.to_string()),
            body: body.to_string(),
            created_at: ts(created),
        });
        self
    }

    /// Records that `source` linked to `at` on `at`'s timeline.
    pub fn linked(
        mut self,
        at: &str,
        source_repo: Option<&str>,
        source_issue: u64,
        action: &str,
        actor: &str,
        created: &str,
    ) -> Self {
        self.timelines.entry(key(at)).or_default().push(TimelineEvent {
            action: action.to_string(),
            actor: Some(actor.to_string()),
            created_at: ts(created),
            source_repository: source_repo.and_then(RepositoryId::new),
            source_issue: IssueNumber::new(source_issue),
        });
        self
    }

    pub fn broken_timeline(mut self, at: &str) -> Self {
        self.broken_timelines.push(key(at));
        self
    }

    pub fn timeline_delay(mut self, delay: Duration) -> Self {
        self.timeline_delay = Some(delay);
        self
    }

    pub fn issue_calls(&self, at: &str) -> usize {
        self.issue_calls.lock().get(&key(at)).copied().unwrap_or(0)
    }

    pub fn comment_calls(&self, at: &str) -> usize {
        self.comment_calls.lock().get(&key(at)).copied().unwrap_or(0)
    }

    pub fn timeline_calls(&self, at: &str) -> usize {
        self.timeline_calls.lock().get(&key(at)).copied().unwrap_or(0)
    }

    pub fn total_timeline_calls(&self) -> usize {
        self.timeline_calls.lock().values().sum()
    }
}

#[async_trait]
impl IssueSource for FakeTracker {
    async fn fetch_issue(&self, key: &NodeKey) -> Result<Issue, SourceError> {
        *self.issue_calls.lock().entry(key.clone()).or_default() += 1;
        match self.issues.get(key) {
            Some(body) => Ok(Issue {
                number: key.number,
                body: body.clone(),
                state: "open".to_string(),
                created_at: None,
            }),
            None => Err(SourceError::NotFound {
                path: format!("repos/{}/issues/{}", key.repository, key.number),
            }),
        }
    }

    async fn fetch_comments(&self, key: &NodeKey) -> Result<Vec<Comment>, SourceError> {
        *self.comment_calls.lock().entry(key.clone()).or_default() += 1;
        Ok(self.comments.get(key).cloned().unwrap_or_default())
    }

    async fn fetch_timeline(&self, key: &NodeKey) -> Result<Vec<TimelineEvent>, SourceError> {
        *self.timeline_calls.lock().entry(key.clone()).or_default() += 1;
        if let Some(delay) = self.timeline_delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken_timelines.contains(key) {
            return Err(SourceError::Transport {
                path: format!("repos/{}/issues/{}/timeline", key.repository, key.number),
                message: "502 Bad Gateway".to_string(),
                retry_after: None,
            });
        }
        Ok(self.timelines.get(key).cloned().unwrap_or_default())
    }
}
