//! Breadth-first traversal of the issue reference graph.
//!
//! Starting from one or more seed issues, the [`TraversalEngine`] expands the
//! web of cross-references among issues, annotating each edge with who created
//! it, when, and whether it came from free text or a structured timeline event.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between the domain
//! rules in the [`graph`] crate and an [`graph::IssueSource`] implementation.
//! It owns no transport details.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `TraversalConfig`, `NodeBudget`, fetch concurrency ceilings |
//! | [`context`] | Run-scoped state: seen/visited sets, issue cache, advisories |
//! | [`comments`] | Bounded, cached comment retrieval |
//! | [`single_flight`] | Keyed request coalescing with a success-only cache |
//! | [`timeline`] | Coalesced timeline retrieval and edge correlation |
//! | [`adjacency`] | Edge dedup store and the output `ReferenceGraph` |
//! | [`engine`] | The BFS driver |

pub mod adjacency;
pub mod comments;
pub mod config;
pub mod context;
pub mod engine;
pub mod single_flight;
pub mod timeline;

pub use adjacency::{AdjacencyStore, ReferenceGraph};
pub use comments::CommentAggregator;
pub use config::{
    NodeBudget, TraversalConfig, COMMENT_FETCH_CONCURRENCY, DEFAULT_MAX_DEPTH,
    DEFAULT_NODE_BUDGET, TIMELINE_FETCH_CONCURRENCY,
};
pub use context::{Advisory, Reservation, TraversalContext};
pub use engine::{FrontierItem, TraversalEngine, TraversalOutcome, TraversalStats};
pub use single_flight::{FlightStats, SingleFlight};
pub use timeline::TimelineResolver;
