//! Serde payloads for the GitHub REST responses the adapter reads.
//!
//! Only the fields the traversal needs are modelled. Everything else in a
//! response is ignored, and optional fields tolerate `null`.

use graph::{Comment, CommentId, Issue, IssueNumber, RepositoryId, TimelineEvent, Timestamp};
use serde::Deserialize;

/// `user` / `actor` objects.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub login: String,
}

/// `GET repos/{repo}/issues/{n}`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuePayload {
    pub number: u64,
    pub body: Option<String>,
    #[serde(default)]
    pub state: String,
    pub created_at: Option<String>,
}

impl IssuePayload {
    pub fn into_issue(self) -> Issue {
        Issue {
            number: IssueNumber::new(self.number),
            body: self.body.unwrap_or_default(),
            state: self.state,
            created_at: self.created_at.as_deref().and_then(Timestamp::parse_rfc3339),
        }
    }
}

/// One element of `GET repos/{repo}/issues/{n}/comments`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentPayload {
    pub id: u64,
    pub body: Option<String>,
    pub user: Option<UserPayload>,
    pub created_at: Option<String>,
}

impl CommentPayload {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: CommentId::new(self.id),
            author: self.user.map(|u| u.login),
            body: self.body.unwrap_or_default(),
            created_at: self.created_at.as_deref().and_then(Timestamp::parse_rfc3339),
        }
    }
}

/// An issue reference inside a timeline event.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedIssuePayload {
    pub number: Option<u64>,
    /// API URL, e.g. `https://api.github.com/repos/owner/repo/issues/7`.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSourcePayload {
    pub issue: Option<LinkedIssuePayload>,
}

/// One element of `GET repos/{repo}/issues/{n}/timeline`.
///
/// The event name is in `event` for most entries and in `type` for a few.
/// The linking issue is normally `source.issue`; some event kinds carry it
/// as a top-level `issue` instead.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelinePayload {
    pub event: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub actor: Option<UserPayload>,
    pub created_at: Option<String>,
    pub source: Option<EventSourcePayload>,
    pub issue: Option<LinkedIssuePayload>,
}

impl TimelinePayload {
    /// Converts the payload into a domain event. Returns `None` for events
    /// that do not name a linking issue.
    pub fn into_event(self) -> Option<TimelineEvent> {
        let linked = self
            .source
            .and_then(|s| s.issue)
            .filter(|issue| issue.number.is_some_and(|n| n != 0))
            .or(self.issue)?;
        let number = linked.number.filter(|n| *n != 0)?;

        Some(TimelineEvent {
            action: self.event.or(self.kind).unwrap_or_default(),
            actor: self.actor.map(|a| a.login),
            created_at: self.created_at.as_deref().and_then(Timestamp::parse_rfc3339),
            source_repository: linked.url.as_deref().and_then(repository_from_api_url),
            source_issue: IssueNumber::new(number),
        })
    }
}

/// Extracts `owner/repo` from an API URL containing `/repos/owner/repo/`.
pub fn repository_from_api_url(url: &str) -> Option<RepositoryId> {
    let (_, tail) = url.split_once("/repos/")?;
    let mut segments = tail.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    RepositoryId::new(format!("{owner}/{repo}"))
}
