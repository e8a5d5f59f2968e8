//! Run-scoped traversal state.
//!
//! A [`TraversalContext`] is created by one engine run and dropped when the
//! run finishes. It owns every cache the run uses, so independent runs (for
//! example, parallel tests) never share state.
//!
//! Each piece of shared state sits behind its own lock, and no lock is held
//! across a fetch:
//!
//! | State | Guards |
//! |-------|--------|
//! | `seen` | discovery depth per node; node budget |
//! | `visited` | nodes already expanded |
//! | `issues` | fetched issue bodies and fetch status |
//! | `adjacency` | per-node edge sets |
//! | timeline resolver | timeline cache and in-flight registry |

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use graph::{Edge, FetchStatus, IssueNode, IssueSource, NodeKey, RepositoryId, SourceError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adjacency::{AdjacencyStore, ReferenceGraph};
use crate::comments::CommentAggregator;
use crate::config::{NodeBudget, TraversalConfig};
use crate::timeline::TimelineResolver;

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        result = fut => result,
    }
}

// ---------------------------------------------------------------------------
// Discovery ledger
// ---------------------------------------------------------------------------

/// Outcome of trying to mark a node as seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// First discovery; one unit of budget was consumed.
    Reserved,
    /// The node was discovered earlier in this run.
    AlreadySeen,
    /// The budget has no capacity left; the discovery is dropped.
    BudgetExhausted,
}

/// Run-scoped advisory surfaced to the operator, never mixed into the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Eligible nodes were dropped because the node budget ran out.
    BudgetExhausted {
        /// The configured budget.
        budget: NodeBudget,
        /// The first node that could not be admitted.
        first_dropped: NodeKey,
    },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::BudgetExhausted {
                budget,
                first_dropped,
            } => write!(
                f,
                "node budget of {budget} exhausted; {first_dropped} and any later discoveries were not expanded"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// State owned by a single traversal run.
pub struct TraversalContext {
    config: TraversalConfig,
    home_repositories: HashSet<RepositoryId>,
    source: Arc<dyn IssueSource>,
    cancel: CancellationToken,
    seen: Mutex<HashMap<NodeKey, u32>>,
    visited: Mutex<HashSet<NodeKey>>,
    issues: Mutex<HashMap<NodeKey, IssueEntry>>,
    adjacency: Mutex<AdjacencyStore>,
    advisory: Mutex<Option<Advisory>>,
    comments: CommentAggregator,
    timeline: TimelineResolver,
}

struct IssueEntry {
    node: IssueNode,
    error: Option<SourceError>,
}

impl TraversalContext {
    /// Creates the context for one run of `config` against `source`.
    pub fn new(
        config: TraversalConfig,
        source: Arc<dyn IssueSource>,
        cancel: CancellationToken,
    ) -> Self {
        let home_repositories = config.seeds.iter().map(|s| s.repository.clone()).collect();
        Self {
            home_repositories,
            comments: CommentAggregator::new(Arc::clone(&source), cancel.clone()),
            timeline: TimelineResolver::new(Arc::clone(&source), cancel.clone()),
            config,
            source,
            cancel,
            seen: Mutex::new(HashMap::new()),
            visited: Mutex::new(HashSet::new()),
            issues: Mutex::new(HashMap::new()),
            adjacency: Mutex::new(AdjacencyStore::default()),
            advisory: Mutex::new(None),
        }
    }

    /// The configuration this run was started with.
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// The run's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Comment access for this run.
    pub fn comments(&self) -> &CommentAggregator {
        &self.comments
    }

    /// Timeline access for this run.
    pub fn timeline(&self) -> &TimelineResolver {
        &self.timeline
    }

    /// Returns `true` if `repository` holds one of the seeds.
    pub fn is_home_repository(&self, repository: &RepositoryId) -> bool {
        self.home_repositories.contains(repository)
    }

    // -- seen / visited -----------------------------------------------------

    /// Marks `key` as seen at `depth` if it is new and the budget allows.
    ///
    /// Budget is consumed here and nowhere else, under the same lock as the
    /// seen check, so concurrent discoveries of one node consume it once.
    pub fn try_reserve(&self, key: &NodeKey, depth: u32) -> Reservation {
        let reservation = {
            let mut seen = self.seen.lock();
            if seen.contains_key(key) {
                Reservation::AlreadySeen
            } else if !self.config.node_budget.allows(seen.len()) {
                Reservation::BudgetExhausted
            } else {
                seen.insert(key.clone(), depth);
                Reservation::Reserved
            }
        };

        match reservation {
            Reservation::Reserved => {
                self.issues.lock().entry(key.clone()).or_insert_with(|| IssueEntry {
                    node: IssueNode::pending(),
                    error: None,
                });
            }
            Reservation::BudgetExhausted => self.raise_budget_advisory(key),
            Reservation::AlreadySeen => {}
        }
        reservation
    }

    /// Number of nodes seen so far.
    pub fn seen_count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Depth at which `key` was first discovered, if it has been.
    pub fn depth_of(&self, key: &NodeKey) -> Option<u32> {
        self.seen.lock().get(key).copied()
    }

    /// Marks `key` as visited. Returns `false` if it already was.
    pub fn mark_visited(&self, key: &NodeKey) -> bool {
        self.visited.lock().insert(key.clone())
    }

    fn raise_budget_advisory(&self, dropped: &NodeKey) {
        let mut advisory = self.advisory.lock();
        if advisory.is_none() {
            warn!(
                budget = %self.config.node_budget,
                first_dropped = %dropped,
                "Node budget exhausted; further discoveries are dropped"
            );
            *advisory = Some(Advisory::BudgetExhausted {
                budget: self.config.node_budget,
                first_dropped: dropped.clone(),
            });
        }
    }

    /// The run's advisory, if one was raised.
    pub fn advisory(&self) -> Option<Advisory> {
        self.advisory.lock().clone()
    }

    // -- issues -------------------------------------------------------------

    /// Returns the body of `key`, fetching it on first use.
    ///
    /// The outcome is cached either way; a failed node reports its original
    /// error on every later call without refetching.
    pub async fn issue_body(&self, key: &NodeKey) -> Result<String, SourceError> {
        {
            let issues = self.issues.lock();
            if let Some(entry) = issues.get(key) {
                match entry.node.status {
                    FetchStatus::Fetched => return Ok(entry.node.body.clone()),
                    FetchStatus::Failed => {
                        return Err(entry.error.clone().unwrap_or(SourceError::Cancelled))
                    }
                    FetchStatus::Pending => {}
                }
            }
        }

        let result = until_cancelled(&self.cancel, self.source.fetch_issue(key)).await;
        if matches!(result, Err(SourceError::Cancelled)) {
            return Err(SourceError::Cancelled);
        }

        let mut issues = self.issues.lock();
        let entry = issues.entry(key.clone()).or_insert_with(|| IssueEntry {
            node: IssueNode::pending(),
            error: None,
        });
        match result {
            Ok(issue) => {
                entry.node = IssueNode {
                    body: issue.body,
                    status: FetchStatus::Fetched,
                };
                Ok(entry.node.body.clone())
            }
            Err(error) => {
                entry.node.status = FetchStatus::Failed;
                entry.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Fetch status of `key`, if it has been discovered.
    pub fn fetch_status(&self, key: &NodeKey) -> Option<FetchStatus> {
        self.issues.lock().get(key).map(|e| e.node.status)
    }

    /// Nodes whose issue fetch failed, in key order.
    pub fn failed_nodes(&self) -> Vec<NodeKey> {
        let mut failed: Vec<NodeKey> = self
            .issues
            .lock()
            .iter()
            .filter(|(_, e)| e.node.status == FetchStatus::Failed)
            .map(|(k, _)| k.clone())
            .collect();
        failed.sort();
        failed
    }

    // -- adjacency ----------------------------------------------------------

    /// Gives `key` an adjacency entry so it renders even with no edges.
    pub fn ensure_node(&self, key: &NodeKey) {
        self.adjacency.lock().ensure(key);
    }

    /// Records `edge` under `source`. Returns `false` if an edge with the
    /// same dedup key was already present.
    pub fn record_edge(&self, source: &NodeKey, edge: Edge) -> bool {
        self.adjacency.lock().insert(source, edge)
    }

    /// Snapshot of the adjacency store as an output graph.
    pub fn graph(&self) -> ReferenceGraph {
        self.adjacency.lock().to_graph()
    }
}
