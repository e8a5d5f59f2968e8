//! Traversal configuration.
//!
//! [`TraversalConfig`] is deserialisable so callers can load it from any serde
//! format; every field has a default except the seeds. A config is validated
//! once, before the first fetch.

use std::num::NonZeroUsize;

use graph::{NodeKey, TraversalError};
use serde::{Deserialize, Serialize};

/// Maximum concurrent comment fetches during seed enrichment.
pub const COMMENT_FETCH_CONCURRENCY: usize = 5;

/// Maximum concurrent timeline fetches across the whole run.
pub const TIMELINE_FETCH_CONCURRENCY: usize = 5;

/// Default cap on distinct nodes a run may discover.
pub const DEFAULT_NODE_BUDGET: usize = 500;

/// Default maximum depth from the seeds.
pub const DEFAULT_MAX_DEPTH: u32 = 1;

// ---------------------------------------------------------------------------

/// Cap on the number of distinct nodes a run may discover.
///
/// Serialised as a plain integer where `0` means [`NodeBudget::Unlimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "usize", into = "usize")]
pub enum NodeBudget {
    /// No cap. Memory use grows with the reachable graph.
    Unlimited,
    /// At most this many nodes are discovered.
    Limited(NonZeroUsize),
}

impl NodeBudget {
    /// Returns `true` if a run that has already discovered `used` nodes may
    /// discover one more.
    pub fn allows(self, used: usize) -> bool {
        match self {
            NodeBudget::Unlimited => true,
            NodeBudget::Limited(limit) => used < limit.get(),
        }
    }
}

impl From<usize> for NodeBudget {
    fn from(value: usize) -> Self {
        NonZeroUsize::new(value).map_or(NodeBudget::Unlimited, NodeBudget::Limited)
    }
}

impl From<NodeBudget> for usize {
    fn from(value: NodeBudget) -> Self {
        match value {
            NodeBudget::Unlimited => 0,
            NodeBudget::Limited(limit) => limit.get(),
        }
    }
}

impl Default for NodeBudget {
    fn default() -> Self {
        NodeBudget::from(DEFAULT_NODE_BUDGET)
    }
}

impl std::fmt::Display for NodeBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeBudget::Unlimited => f.write_str("unlimited"),
            NodeBudget::Limited(limit) => write!(f, "{limit}"),
        }
    }
}

// ---------------------------------------------------------------------------

/// Options recognised by the traversal engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Issues the traversal starts from, at depth zero.
    pub seeds: Vec<NodeKey>,
    /// Nodes deeper than this are never expanded.
    pub max_depth: u32,
    /// Whether to expand issues outside the seeds' repositories.
    pub cross_repository: bool,
    /// Cap on distinct nodes discovered, seeds included.
    pub node_budget: NodeBudget,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            cross_repository: false,
            node_budget: NodeBudget::default(),
        }
    }
}

impl TraversalConfig {
    /// Creates a config for `seeds` with every other option at its default.
    pub fn new(seeds: impl IntoIterator<Item = NodeKey>) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Sets the maximum depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enables or disables cross-repository expansion.
    #[must_use]
    pub fn with_cross_repository(mut self, enabled: bool) -> Self {
        self.cross_repository = enabled;
        self
    }

    /// Sets the node budget; `0` means unlimited.
    #[must_use]
    pub fn with_node_budget(mut self, budget: usize) -> Self {
        self.node_budget = NodeBudget::from(budget);
        self
    }

    /// Checks the config before a run starts.
    pub fn validate(&self) -> Result<(), TraversalError> {
        if self.seeds.is_empty() {
            return Err(TraversalError::Configuration {
                message: "at least one seed issue is required".to_string(),
            });
        }
        Ok(())
    }
}
