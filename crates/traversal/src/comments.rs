//! Comment aggregation.
//!
//! [`CommentAggregator`] fetches each node's discussion comments at most once
//! per run and caches them by [`NodeKey`]. A failed fetch caches an empty list:
//! one node's comments failing to load never stops the traversal, and the
//! node is not retried within the run.
//!
//! Seed enrichment goes through [`CommentAggregator::prefetch`], which fetches
//! a batch concurrently with at most [`COMMENT_FETCH_CONCURRENCY`] requests in
//! flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use graph::{Comment, IssueSource, NodeKey, SourceError};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::COMMENT_FETCH_CONCURRENCY;
use crate::context::until_cancelled;

/// Fetch-once, cached access to issue comments.
pub struct CommentAggregator {
    source: Arc<dyn IssueSource>,
    cancel: CancellationToken,
    permits: Semaphore,
    cache: Mutex<HashMap<NodeKey, Arc<[Comment]>>>,
    fetches: AtomicUsize,
}

impl CommentAggregator {
    /// Creates an aggregator reading from `source`.
    pub fn new(source: Arc<dyn IssueSource>, cancel: CancellationToken) -> Self {
        Self {
            source,
            cancel,
            permits: Semaphore::new(COMMENT_FETCH_CONCURRENCY),
            cache: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Fetches comments for every uncached key in `keys` concurrently.
    pub async fn prefetch(&self, keys: &[NodeKey]) {
        let pending: Vec<&NodeKey> = {
            let cache = self.cache.lock();
            keys.iter().filter(|k| !cache.contains_key(*k)).collect()
        };
        debug!(count = pending.len(), "Prefetching seed comments");

        join_all(pending.into_iter().map(|key| async move {
            let comments = {
                let _permit = match self.permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                self.load(key).await
            };
            self.cache.lock().entry(key.clone()).or_insert(comments);
        }))
        .await;
    }

    /// Returns the comments on `key`, oldest first, fetching them on first use.
    pub async fn comments(&self, key: &NodeKey) -> Arc<[Comment]> {
        let cached = self.cache.lock().get(key).cloned();
        if let Some(cached) = cached {
            return cached;
        }
        let loaded = self.load(key).await;
        Arc::clone(self.cache.lock().entry(key.clone()).or_insert(loaded))
    }

    /// Number of upstream comment fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn load(&self, key: &NodeKey) -> Arc<[Comment]> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match until_cancelled(&self.cancel, self.source.fetch_comments(key)).await {
            Ok(mut comments) => {
                order_by_creation(&mut comments);
                comments.into()
            }
            Err(SourceError::Cancelled) => Arc::from(Vec::new()),
            Err(error) => {
                warn!(node = %key, %error, "Comment fetch failed; continuing without comments");
                Arc::from(Vec::new())
            }
        }
    }
}

/// Sorts timestamped comments oldest first within the slots they occupy.
/// Comments without a timestamp stay where upstream put them; ties keep
/// upstream order.
fn order_by_creation(comments: &mut [Comment]) {
    let slots: Vec<usize> = comments
        .iter()
        .enumerate()
        .filter(|(_, c)| c.created_at.is_some())
        .map(|(i, _)| i)
        .collect();
    let mut dated: Vec<Comment> = slots.iter().map(|&i| comments[i].clone()).collect();
    dated.sort_by_key(|c| c.created_at);
    for (slot, comment) in slots.into_iter().zip(dated) {
        comments[slot] = comment;
    }
}
