//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! an [`IssueNumber`] with a [`CommentId`] even though both are `u64` under the
//! hood.
//!
//! [`NodeKey`] is the vertex identity of the reference graph: a repository plus
//! an issue number. It renders as `owner/repo#number` and parses from either
//! that shorthand or a full issue URL.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and a
// TryFrom<String> that deserialisation goes through.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = EmptyIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(EmptyIdError {
                    kind: stringify!($name),
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Error returned when a string identifier is built from an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} must not be empty")]
pub struct EmptyIdError {
    /// Name of the identifier type being built.
    pub kind: &'static str,
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (tracker-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
            Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }

            /// Returns `true` if this is the zero sentinel.
            pub fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: tracker-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// The number of an issue within its repository.
    IssueNumber
}

u64_id! {
    /// Identifies a discussion comment on an issue.
    ///
    /// Zero is the "not comment-derived" sentinel carried by body and
    /// timeline edges.
    CommentId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a repository in `"owner/repo"` format.
    RepositoryId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single traversal run.
///
/// Generated fresh for every invocation and attached to the run's tracing span
/// so all activity from one traversal can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraversalRunId(Uuid);

impl TraversalRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for TraversalRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Node key
// ---------------------------------------------------------------------------

/// Vertex identity in the reference graph: `(repository, issue number)`.
///
/// Immutable once built. Ordering is by repository then number, which gives
/// rendered output a stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// Repository the issue lives in.
    pub repository: RepositoryId,
    /// Issue number within `repository`.
    pub number: IssueNumber,
}

impl NodeKey {
    /// Creates a [`NodeKey`].
    pub fn new(repository: RepositoryId, number: IssueNumber) -> Self {
        Self { repository, number }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

/// Error returned when a string is neither `owner/repo#N` nor an issue URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not an issue reference (expected owner/repo#N or an issue URL)")]
pub struct ParseNodeKeyError {
    /// The rejected input.
    pub input: String,
}

static SHORTHAND_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)#(\d+)$").expect("shorthand regex is valid")
});

static ISSUE_URL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://[^/]+/([^/]+)/([^/]+)/issues/(\d+)/?$")
        .expect("issue URL regex is valid")
});

impl FromStr for NodeKey {
    type Err = ParseNodeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = SHORTHAND_KEY
            .captures(trimmed)
            .or_else(|| ISSUE_URL_KEY.captures(trimmed));

        let parsed = caps.and_then(|c| {
            let owner = c.get(1)?.as_str();
            let repo = c.get(2)?.as_str().trim_end_matches(".git");
            let number = c.get(3)?.as_str().parse::<u64>().ok()?;
            let repository = RepositoryId::new(format!("{owner}/{repo}"))?;
            Some(NodeKey::new(repository, IssueNumber::new(number)))
        });

        parsed.ok_or_else(|| ParseNodeKeyError {
            input: s.to_string(),
        })
    }
}
