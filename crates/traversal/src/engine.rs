//! Breadth-first reference traversal.
//!
//! [`TraversalEngine::run`] drives one traversal:
//!
//! 1. Reserve and fetch every seed at depth zero. A seed that cannot be
//!    fetched aborts the run.
//! 2. Prefetch seed comments concurrently.
//! 3. Dequeue frontier items in FIFO order. For each, mark it visited, give it
//!    an adjacency entry, fetch its body and comments, extract references,
//!    correlate each candidate against the destination's timeline, record the
//!    edges, and enqueue eligible destinations at `depth + 1`.
//!
//! The dequeue loop is sequential so depth and budget bookkeeping never race.
//! Timeline lookups for one node's candidates run concurrently and are
//! coalesced per destination by the [`TimelineResolver`].
//!
//! A node whose issue fetch fails is skipped; its siblings are unaffected.
//!
//! [`TimelineResolver`]: crate::TimelineResolver

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::join_all;
use graph::{
    extract_references, Edge, IssueSource, NodeKey, SourceError, TraversalError, TraversalRunId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::adjacency::ReferenceGraph;
use crate::config::TraversalConfig;
use crate::context::{Advisory, Reservation, TraversalContext};

/// A discovered node waiting to be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    /// The node to expand.
    pub key: NodeKey,
    /// Distance from the nearest seed, assigned at first discovery.
    pub depth: u32,
}

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Nodes discovered (budget consumed).
    pub nodes_seen: usize,
    /// Nodes whose expansion completed.
    pub nodes_expanded: usize,
    /// Nodes whose issue fetch failed.
    pub nodes_failed: usize,
    /// Upstream comment fetches.
    pub comment_fetches: usize,
    /// Upstream timeline fetches.
    pub timeline_fetches: usize,
    /// Timeline lookups served from cache.
    pub timeline_cache_hits: usize,
    /// Timeline lookups that joined a fetch already in flight.
    pub timeline_coalesced: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct TraversalOutcome {
    /// Identifier attached to the run's tracing span.
    pub run_id: TraversalRunId,
    /// The annotated adjacency graph.
    pub graph: ReferenceGraph,
    /// Operator-facing advisories (at most one per kind).
    pub advisories: Vec<Advisory>,
    /// Nodes that were discovered but could not be fetched.
    pub failed_nodes: Vec<NodeKey>,
    /// Run counters.
    pub stats: TraversalStats,
}

/// Runs reference traversals against an [`IssueSource`].
///
/// The engine itself is stateless; every run builds a fresh
/// [`TraversalContext`], so one engine can serve concurrent runs.
#[derive(Clone)]
pub struct TraversalEngine {
    source: Arc<dyn IssueSource>,
}

impl TraversalEngine {
    /// Creates an engine reading from `source`.
    pub fn new(source: Arc<dyn IssueSource>) -> Self {
        Self { source }
    }

    /// Runs a traversal to completion.
    pub async fn run(&self, config: TraversalConfig) -> Result<TraversalOutcome, TraversalError> {
        self.run_until_cancelled(config, CancellationToken::new()).await
    }

    /// Runs a traversal that stops with [`TraversalError::Cancelled`] once
    /// `cancel` fires. In-flight fetches observe the same token.
    pub async fn run_until_cancelled(
        &self,
        config: TraversalConfig,
        cancel: CancellationToken,
    ) -> Result<TraversalOutcome, TraversalError> {
        config.validate()?;

        let run_id = TraversalRunId::new_random();
        let span = info_span!(
            "traversal",
            run_id = %run_id,
            seeds = config.seeds.len(),
            max_depth = config.max_depth,
            cross_repository = config.cross_repository,
            node_budget = %config.node_budget,
        );

        let ctx = TraversalContext::new(config, Arc::clone(&self.source), cancel);
        traverse(&ctx, run_id).instrument(span).await
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

async fn traverse(
    ctx: &TraversalContext,
    run_id: TraversalRunId,
) -> Result<TraversalOutcome, TraversalError> {
    let mut queue = seed_frontier(ctx).await?;
    info!(frontier = queue.len(), "Seeds established");

    let mut expanded = 0usize;
    while let Some(item) = queue.pop_front() {
        if ctx.cancel_token().is_cancelled() {
            return Err(TraversalError::Cancelled);
        }
        if expand(ctx, &item, &mut queue).await? {
            expanded += 1;
        }
    }

    let outcome = finish(ctx, run_id, expanded);
    info!(
        nodes = outcome.graph.node_count(),
        edges = outcome.graph.edge_count(),
        failed = outcome.failed_nodes.len(),
        "Traversal complete"
    );
    Ok(outcome)
}

async fn seed_frontier(
    ctx: &TraversalContext,
) -> Result<VecDeque<FrontierItem>, TraversalError> {
    let mut queue = VecDeque::new();
    for seed in &ctx.config().seeds {
        if ctx.try_reserve(seed, 0) == Reservation::Reserved {
            queue.push_back(FrontierItem {
                key: seed.clone(),
                depth: 0,
            });
        }
    }

    for item in &queue {
        match ctx.issue_body(&item.key).await {
            Ok(_) => {}
            Err(SourceError::Cancelled) => return Err(TraversalError::Cancelled),
            Err(source) => {
                return Err(TraversalError::SeedUnavailable {
                    seed: item.key.clone(),
                    source,
                })
            }
        }
    }

    let seeds: Vec<NodeKey> = queue.iter().map(|item| item.key.clone()).collect();
    ctx.comments().prefetch(&seeds).await;
    Ok(queue)
}

/// Expands one frontier item. Returns `true` if its edges were computed.
async fn expand(
    ctx: &TraversalContext,
    item: &FrontierItem,
    queue: &mut VecDeque<FrontierItem>,
) -> Result<bool, TraversalError> {
    let key = &item.key;
    if !ctx.mark_visited(key) {
        return Ok(false);
    }
    ctx.ensure_node(key);

    let body = match ctx.issue_body(key).await {
        Ok(body) => body,
        Err(SourceError::Cancelled) => return Err(TraversalError::Cancelled),
        Err(error) => {
            warn!(node = %key, %error, "Issue fetch failed; node not expanded");
            return Ok(false);
        }
    };
    let comments = ctx.comments().comments(key).await;

    let mut candidates: Vec<Edge> = extract_references(&body)
        .iter()
        .map(|r| Edge::from_body(r.resolve(&key.repository)))
        .collect();
    for comment in comments.iter() {
        candidates.extend(
            extract_references(&comment.body)
                .iter()
                .map(|r| Edge::from_comment(r.resolve(&key.repository), comment)),
        );
    }
    debug!(node = %key, depth = item.depth, candidates = candidates.len(), "Expanding");

    let edges = join_all(candidates.into_iter().map(|mut edge| async move {
        if let Some(event) = ctx.timeline().correlate(key, &edge.destination).await {
            edge.upgrade_with(&event);
        }
        edge
    }))
    .await;
    if ctx.cancel_token().is_cancelled() {
        return Err(TraversalError::Cancelled);
    }

    for edge in edges {
        let destination = edge.destination.clone();
        ctx.record_edge(key, edge);
        enqueue_child(ctx, item, destination, queue);
    }
    Ok(true)
}

fn enqueue_child(
    ctx: &TraversalContext,
    parent: &FrontierItem,
    destination: NodeKey,
    queue: &mut VecDeque<FrontierItem>,
) {
    let depth = parent.depth + 1;
    if depth > ctx.config().max_depth {
        return;
    }
    if !ctx.config().cross_repository && !ctx.is_home_repository(&destination.repository) {
        return;
    }
    if ctx.try_reserve(&destination, depth) == Reservation::Reserved {
        queue.push_back(FrontierItem {
            key: destination,
            depth,
        });
    }
}

fn finish(ctx: &TraversalContext, run_id: TraversalRunId, expanded: usize) -> TraversalOutcome {
    let failed_nodes = ctx.failed_nodes();
    let timeline = ctx.timeline().stats();
    TraversalOutcome {
        run_id,
        graph: ctx.graph(),
        advisories: ctx.advisory().into_iter().collect(),
        stats: TraversalStats {
            nodes_seen: ctx.seen_count(),
            nodes_expanded: expanded,
            nodes_failed: failed_nodes.len(),
            comment_fetches: ctx.comments().fetch_count(),
            timeline_fetches: timeline.fetches,
            timeline_cache_hits: timeline.cache_hits,
            timeline_coalesced: timeline.coalesced,
        },
        failed_nodes,
    }
}
