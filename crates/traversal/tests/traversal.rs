//! End-to-end traversal runs against an in-memory tracker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{key, ts, FakeTracker};
use graph::{CommentId, NodeKey, Provenance, TraversalError};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use traversal::{Advisory, NodeBudget, TraversalConfig, TraversalEngine, TraversalOutcome};

fn engine(tracker: &Arc<FakeTracker>) -> TraversalEngine {
    TraversalEngine::new(Arc::clone(tracker) as Arc<dyn graph::IssueSource>)
}

fn headers(outcome: &TraversalOutcome) -> Vec<String> {
    outcome.graph.iter().map(|(k, _)| k.to_string()).collect()
}

fn targets(outcome: &TraversalOutcome, at: &str) -> Vec<String> {
    let mut out: Vec<String> = outcome
        .graph
        .edges(&key(at))
        .unwrap_or_default()
        .iter()
        .map(|e| e.destination.to_string())
        .collect();
    out.sort();
    out
}

/// Two issues in `r1/r1` referencing each other plus one external issue.
fn two_repo_fixture() -> FakeTracker {
    FakeTracker::new()
        .issue("r1/r1#1", "See #2 and owner2/repo#3")
        .issue("r1/r1#2", "Backref to #1")
        .issue("owner2/repo#3", "External issue")
        .comment("r1/r1#1", 101, "alice", "comment with #2", "2024-05-01T10:00:00Z")
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn home_repository_traversal_stays_in_seed_repositories() {
    let tracker = Arc::new(two_repo_fixture());
    let outcome = engine(&tracker)
        .run(
            TraversalConfig::new([key("https://github.com/r1/r1/issues/1")])
                .with_max_depth(1)
                .with_cross_repository(false),
        )
        .await
        .unwrap();

    // The bare "#3" inside "owner2/repo#3" also resolves in the home repository.
    assert_eq!(
        targets(&outcome, "r1/r1#1"),
        vec!["owner2/repo#3", "r1/r1#2", "r1/r1#2", "r1/r1#3"]
    );
    assert_eq!(targets(&outcome, "r1/r1#2"), vec!["r1/r1#1"]);
    assert!(!outcome.graph.contains(&key("owner2/repo#3")));
    assert_eq!(tracker.issue_calls("owner2/repo#3"), 0);

    let from_comment = outcome
        .graph
        .edges(&key("r1/r1#1"))
        .unwrap()
        .iter()
        .find(|e| e.provenance == Provenance::Comment)
        .unwrap();
    assert_eq!(from_comment.destination, key("r1/r1#2"));
    assert_eq!(from_comment.actor.as_deref(), Some("alice"));
    assert_eq!(from_comment.comment_id, CommentId::new(101));
    assert_eq!(from_comment.timestamp, ts("2024-05-01T10:00:00Z"));
}

#[tokio::test]
async fn cross_repository_traversal_expands_external_issues() {
    let tracker = Arc::new(two_repo_fixture());
    let outcome = engine(&tracker)
        .run(
            TraversalConfig::new([key("r1/r1#1")])
                .with_max_depth(2)
                .with_cross_repository(true),
        )
        .await
        .unwrap();

    assert!(outcome.graph.contains(&key("owner2/repo#3")));
    assert_eq!(outcome.graph.edges(&key("owner2/repo#3")), Some(&[][..]));
    assert_eq!(tracker.issue_calls("owner2/repo#3"), 1);
}

#[tokio::test]
async fn cycles_terminate_with_each_node_expanded_once() {
    let tracker = Arc::new(
        FakeTracker::new()
            .issue("r1/r1#1", "see #2")
            .issue("r1/r1#2", "see #1"),
    );
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(5))
        .await
        .unwrap();

    assert_eq!(headers(&outcome), vec!["r1/r1#1", "r1/r1#2"]);
    assert_eq!(targets(&outcome, "r1/r1#1"), vec!["r1/r1#2"]);
    assert_eq!(targets(&outcome, "r1/r1#2"), vec!["r1/r1#1"]);
    assert_eq!(tracker.issue_calls("r1/r1#1"), 1);
    assert_eq!(tracker.issue_calls("r1/r1#2"), 1);
    assert_eq!(outcome.stats.nodes_expanded, 2);
}

// ---------------------------------------------------------------------------
// Depth and scope
// ---------------------------------------------------------------------------

fn chain() -> FakeTracker {
    FakeTracker::new()
        .issue("r1/r1#1", "next #2")
        .issue("r1/r1#2", "next #3")
        .issue("r1/r1#3", "next #4")
        .issue("r1/r1#4", "end")
}

#[tokio::test]
async fn nodes_at_max_depth_are_expanded_but_children_are_not() {
    let tracker = Arc::new(chain());
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(2))
        .await
        .unwrap();

    assert_eq!(headers(&outcome), vec!["r1/r1#1", "r1/r1#2", "r1/r1#3"]);
    assert_eq!(targets(&outcome, "r1/r1#3"), vec!["r1/r1#4"]);
    assert_eq!(tracker.issue_calls("r1/r1#4"), 0);
}

#[tokio::test]
async fn depth_zero_expands_only_the_seeds() {
    let tracker = Arc::new(chain());
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(0))
        .await
        .unwrap();

    assert_eq!(headers(&outcome), vec!["r1/r1#1"]);
    assert_eq!(targets(&outcome, "r1/r1#1"), vec!["r1/r1#2"]);
    assert_eq!(outcome.stats.nodes_seen, 1);
}

#[tokio::test]
async fn every_seed_repository_is_a_home_repository() {
    let tracker = Arc::new(
        FakeTracker::new()
            .issue("r1/r1#1", "owner2/repo#4 and elsewhere/x#1")
            .issue("owner2/repo#3", "nothing")
            .issue("owner2/repo#4", "nothing")
            .issue("elsewhere/x#1", "nothing"),
    );
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1"), key("owner2/repo#3")]))
        .await
        .unwrap();

    assert!(outcome.graph.contains(&key("owner2/repo#4")));
    assert!(!outcome.graph.contains(&key("elsewhere/x#1")));
    assert_eq!(tracker.issue_calls("elsewhere/x#1"), 0);
}

#[tokio::test]
async fn duplicate_seeds_are_expanded_once() {
    let tracker = Arc::new(chain());
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1"), key("r1/r1#1")]).with_max_depth(0))
        .await
        .unwrap();

    assert_eq!(headers(&outcome), vec!["r1/r1#1"]);
    assert_eq!(tracker.issue_calls("r1/r1#1"), 1);
    assert_eq!(tracker.comment_calls("r1/r1#1"), 1);
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exhausted_budget_drops_nodes_and_raises_one_advisory() {
    let mut tracker = FakeTracker::new().issue("r1/r1#1", "#2 #3 #4 #5 #6");
    for n in 2..=6 {
        tracker = tracker.issue(&format!("r1/r1#{n}"), "leaf");
    }
    let tracker = Arc::new(tracker);
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_node_budget(3))
        .await
        .unwrap();

    assert_eq!(outcome.stats.nodes_seen, 3);
    assert_eq!(headers(&outcome), vec!["r1/r1#1", "r1/r1#2", "r1/r1#3"]);
    // Edges to dropped nodes are still recorded.
    assert_eq!(targets(&outcome, "r1/r1#1").len(), 5);
    assert_eq!(
        outcome.advisories,
        vec![Advisory::BudgetExhausted {
            budget: NodeBudget::from(3),
            first_dropped: key("r1/r1#4"),
        }]
    );
    assert_eq!(tracker.issue_calls("r1/r1#5"), 0);
}

#[tokio::test]
async fn unlimited_budget_raises_no_advisory() {
    let tracker = Arc::new(chain());
    let outcome = engine(&tracker)
        .run(
            TraversalConfig::new([key("r1/r1#1")])
                .with_max_depth(10)
                .with_node_budget(0),
        )
        .await
        .unwrap();

    assert_eq!(outcome.graph.node_count(), 4);
    assert!(outcome.advisories.is_empty());
}

// ---------------------------------------------------------------------------
// Timeline correlation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timeline_event_upgrades_and_collapses_candidates() {
    let tracker = Arc::new(
        FakeTracker::new()
            .issue("r1/r1#1", "fixes #2")
            .issue("r1/r1#2", "target")
            .comment("r1/r1#1", 7, "alice", "#2 again", "2024-05-01T10:00:00Z")
            .linked("r1/r1#2", None, 1, "cross-referenced", "bob", "2024-04-30T08:00:00Z"),
    );
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(0))
        .await
        .unwrap();

    let edges = outcome.graph.edges(&key("r1/r1#1")).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].provenance, Provenance::Timeline);
    assert_eq!(edges[0].actor.as_deref(), Some("bob"));
    assert_eq!(edges[0].action.as_deref(), Some("cross-referenced"));
    assert_eq!(edges[0].timestamp, ts("2024-04-30T08:00:00Z"));
    assert!(edges[0].comment_id.is_zero());
    assert_eq!(tracker.timeline_calls("r1/r1#2"), 1);
}

#[tokio::test]
async fn events_from_other_repositories_do_not_correlate() {
    let tracker = Arc::new(
        FakeTracker::new()
            .issue("r1/r1#1", "fixes #2")
            .issue("r1/r1#2", "target")
            .linked(
                "r1/r1#2",
                Some("fork/r1"),
                1,
                "cross-referenced",
                "eve",
                "2024-04-30T08:00:00Z",
            ),
    );
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(0))
        .await
        .unwrap();

    let edges = outcome.graph.edges(&key("r1/r1#1")).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].provenance, Provenance::Body);
    assert_eq!(edges[0].actor, None);
}

#[tokio::test]
async fn unavailable_timeline_keeps_free_text_provenance() {
    let tracker = Arc::new(
        FakeTracker::new()
            .issue("r1/r1#1", "fixes #2")
            .issue("r1/r1#2", "target")
            .broken_timeline("r1/r1#2"),
    );
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(0))
        .await
        .unwrap();

    let edges = outcome.graph.edges(&key("r1/r1#1")).unwrap();
    assert_eq!(edges[0].provenance, Provenance::Body);
}

#[tokio::test]
async fn concurrent_lookups_share_one_timeline_fetch() {
    let mut tracker = FakeTracker::new()
        .issue("r1/r1#1", "tracking #9")
        .timeline_delay(Duration::from_millis(20));
    for id in 1..=10 {
        tracker = tracker.comment(
            "r1/r1#1",
            id,
            "alice",
            "still blocked on #9",
            &format!("2024-05-01T10:00:{id:02}Z"),
        );
    }
    let tracker = Arc::new(tracker);
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(0))
        .await
        .unwrap();

    assert_eq!(tracker.timeline_calls("r1/r1#9"), 1);
    assert_eq!(outcome.stats.timeline_fetches, 1);
    assert_eq!(
        outcome.stats.timeline_cache_hits + outcome.stats.timeline_coalesced,
        10
    );
    assert_eq!(outcome.graph.edge_count(), 11);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_node_is_pruned_without_affecting_siblings() {
    let tracker = Arc::new(
        FakeTracker::new()
            .issue("r1/r1#1", "#2 and #3")
            .issue("r1/r1#3", "see #4"),
    );
    let outcome = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1")]).with_max_depth(1))
        .await
        .unwrap();

    assert_eq!(outcome.failed_nodes, vec![key("r1/r1#2")]);
    assert_eq!(outcome.graph.edges(&key("r1/r1#2")), Some(&[][..]));
    assert_eq!(targets(&outcome, "r1/r1#3"), vec!["r1/r1#4"]);
    assert_eq!(outcome.stats.nodes_failed, 1);
    assert_eq!(tracker.issue_calls("r1/r1#2"), 1);
    assert_eq!(tracker.comment_calls("r1/r1#2"), 0);
}

#[tokio::test]
async fn unavailable_seed_aborts_the_run() {
    let tracker = Arc::new(FakeTracker::new().issue("r1/r1#1", "fine"));
    let err = engine(&tracker)
        .run(TraversalConfig::new([key("r1/r1#1"), key("r1/r1#5")]))
        .await
        .unwrap_err();

    match err {
        TraversalError::SeedUnavailable { seed, .. } => assert_eq!(seed, key("r1/r1#5")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn run_without_seeds_is_rejected() {
    let tracker = Arc::new(FakeTracker::new());
    let err = engine(&tracker)
        .run(TraversalConfig::new(Vec::<NodeKey>::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, TraversalError::Configuration { .. }));
}

// ---------------------------------------------------------------------------
// Cancellation and isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pre_cancelled_run_fetches_nothing() {
    let tracker = Arc::new(chain());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine(&tracker)
        .run_until_cancelled(TraversalConfig::new([key("r1/r1#1")]), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, TraversalError::Cancelled));
    assert_eq!(tracker.issue_calls("r1/r1#1"), 0);
}

#[tokio::test]
async fn cancellation_interrupts_slow_fetches() {
    let tracker = Arc::new(chain().timeline_delay(Duration::from_secs(30)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine(&tracker).run_until_cancelled(TraversalConfig::new([key("r1/r1#1")]), cancel),
    )
    .await
    .expect("run should stop promptly once cancelled");

    assert!(matches!(result, Err(TraversalError::Cancelled)));
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let tracker = Arc::new(two_repo_fixture());
    let engine = engine(&tracker);
    let config = TraversalConfig::new([key("r1/r1#1")]).with_max_depth(1);

    let (a, b) = tokio::join!(engine.run(config.clone()), engine.run(config));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.graph, b.graph);
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(tracker.issue_calls("r1/r1#1"), 2);
}
