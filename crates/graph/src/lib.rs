//! Core domain for the issue reference graph.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used by the traversal. Infrastructure crates implement
//! the [`IssueSource`] port defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no network I/O.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryId`, `IssueNumber`, `NodeKey`, etc.) |
//! | [`types`] | Shared value types (`Issue`, `Comment`, `TimelineEvent`, `Edge`, etc.) |
//! | [`errors`] | Upstream and run-level error types, retry policy |
//! | [`references`] | Free-text reference extraction |
//! | [`source`] | The [`IssueSource`] upstream port |

pub mod errors;
pub mod identifiers;
pub mod references;
pub mod source;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{RetryPolicy, SourceError, TraversalError};
pub use identifiers::{
    CommentId, EmptyIdError, IssueNumber, NodeKey, ParseNodeKeyError, RepositoryId,
    TraversalRunId,
};
pub use references::extract_references;
pub use source::IssueSource;
pub use types::{
    Comment, Edge, EdgeKey, FetchStatus, Issue, IssueNode, Provenance, Reference, TimelineEvent,
    Timestamp,
};
