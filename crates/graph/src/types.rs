//! Shared value types for the issue reference graph domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the data that flows through a traversal: fetched issues and comments,
//! structured timeline events, candidate references, and the annotated edges
//! the traversal records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommentId, IssueNumber, NodeKey, RepositoryId};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 timestamp, returning `None` when malformed.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

// ---------------------------------------------------------------------------
// Upstream records
// ---------------------------------------------------------------------------

/// An issue as returned by the upstream tracker.
///
/// Only the fields the traversal reads are modelled; everything else in the
/// upstream payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within its repository.
    pub number: IssueNumber,
    /// Markdown body. Empty when the issue has no description.
    pub body: String,
    /// Upstream state label (e.g. `"open"`, `"closed"`).
    pub state: String,
    /// Creation time, when the upstream record carries one.
    pub created_at: Option<Timestamp>,
}

/// A discussion comment on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Upstream comment identifier.
    pub id: CommentId,
    /// Login of the comment author. `None` for deleted accounts.
    pub author: Option<String>,
    /// Markdown body.
    pub body: String,
    /// Creation time.
    pub created_at: Option<Timestamp>,
}

/// A structured timeline event that records a link from another issue.
///
/// Upstream sources return only events whose `source_issue` is non-zero;
/// unrelated timeline entries (labels, assignments, ...) are filtered out
/// during decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event type label (e.g. `"cross-referenced"`, `"connected"`).
    pub action: String,
    /// Login of the user who triggered the event.
    pub actor: Option<String>,
    /// When the event happened.
    pub created_at: Option<Timestamp>,
    /// Repository of the issue that triggered the event.
    ///
    /// `None` means "same repository as the destination" by upstream
    /// convention.
    pub source_repository: Option<RepositoryId>,
    /// Number of the issue that triggered the event.
    pub source_issue: IssueNumber,
}

impl TimelineEvent {
    /// Returns `true` if this event was recorded because `source` referenced
    /// the issue at `destination`.
    ///
    /// The source repository matches when it is absent, equal to the source
    /// repository, or equal to the destination repository. Upstream data is
    /// inconsistent about which of the latter two it reports.
    pub fn correlates_with(&self, source: &NodeKey, destination: &RepositoryId) -> bool {
        if self.source_issue != source.number {
            return false;
        }
        match &self.source_repository {
            None => true,
            Some(repo) => repo == &source.repository || repo == destination,
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch state
// ---------------------------------------------------------------------------

/// Fetch lifecycle of an issue within one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Discovered, not yet fetched.
    Pending,
    /// Body fetched successfully.
    Fetched,
    /// Fetch failed; the node will not be expanded.
    Failed,
}

/// Fetched state for a [`NodeKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueNode {
    /// Issue body; empty until fetched.
    pub body: String,
    /// Where the node is in its fetch lifecycle.
    pub status: FetchStatus,
}

impl IssueNode {
    /// A node that has been discovered but not fetched.
    pub fn pending() -> Self {
        Self {
            body: String::new(),
            status: FetchStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// References and edges
// ---------------------------------------------------------------------------

/// A candidate edge target found in free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Explicit repository. `None` means "the repository the text belongs to".
    pub repository: Option<RepositoryId>,
    /// Referenced issue number.
    pub number: IssueNumber,
    /// The matched text, verbatim.
    pub raw: String,
}

impl Reference {
    /// Resolves this reference to a [`NodeKey`], using `context` when the
    /// reference names no repository.
    pub fn resolve(&self, context: &RepositoryId) -> NodeKey {
        let repository = self.repository.clone().unwrap_or_else(|| context.clone());
        NodeKey::new(repository, self.number)
    }
}

/// Evidence source of an edge.
///
/// Variants are declared strongest first: structured timeline data supersedes
/// free-text inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Correlated with a structured linking event on the destination's timeline.
    Timeline,
    /// Mentioned in a discussion comment.
    Comment,
    /// Mentioned in the issue body.
    Body,
}

impl Provenance {
    /// Returns the lowercase label used in rendered output.
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Timeline => "timeline",
            Provenance::Comment => "comment",
            Provenance::Body => "body",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, annotated reference from one issue to another.
///
/// The source node is implicit: edges are stored under their source key in
/// the adjacency store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Destination issue.
    pub destination: NodeKey,
    /// Evidence source.
    pub provenance: Provenance,
    /// Who created the reference, when known.
    pub actor: Option<String>,
    /// When the reference was created, when known.
    pub timestamp: Option<Timestamp>,
    /// Timeline event type. Only set for [`Provenance::Timeline`] edges.
    pub action: Option<String>,
    /// Originating comment; zero unless the edge is comment-derived.
    pub comment_id: CommentId,
}

impl Edge {
    /// An unattributed edge found in an issue body.
    pub fn from_body(destination: NodeKey) -> Self {
        Self {
            destination,
            provenance: Provenance::Body,
            actor: None,
            timestamp: None,
            action: None,
            comment_id: CommentId::default(),
        }
    }

    /// An edge attributed to the author and time of `comment`.
    pub fn from_comment(destination: NodeKey, comment: &Comment) -> Self {
        Self {
            destination,
            provenance: Provenance::Comment,
            actor: comment.author.clone(),
            timestamp: comment.created_at,
            action: None,
            comment_id: comment.id,
        }
    }

    /// Rewrites this edge with the attribution of a correlating timeline event.
    ///
    /// Provenance becomes [`Provenance::Timeline`] and the comment id is cleared.
    pub fn upgrade_with(&mut self, event: &TimelineEvent) {
        self.provenance = Provenance::Timeline;
        self.actor = event.actor.clone();
        self.timestamp = event.created_at;
        self.action = Some(event.action.clone());
        self.comment_id = CommentId::default();
    }

    /// Returns the key two edges must share to collapse into one.
    pub fn dedup_key(&self) -> EdgeKey {
        EdgeKey {
            destination: self.destination.clone(),
            provenance: self.provenance,
            actor: self.actor.clone(),
            action: self.action.clone(),
            timestamp: self.timestamp,
            comment_id: self.comment_id,
        }
    }
}

/// Identity of an [`Edge`] within its source node's edge set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    destination: NodeKey,
    provenance: Provenance,
    actor: Option<String>,
    action: Option<String>,
    timestamp: Option<Timestamp>,
    comment_id: CommentId,
}
