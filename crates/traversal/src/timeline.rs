//! Timeline resolution and edge correlation.
//!
//! Every candidate reference triggers a timeline lookup on its destination,
//! so many lookups target the same node. [`TimelineResolver`] routes them
//! through a [`SingleFlight`] so each destination's timeline is fetched once
//! per run, no matter how many expansions ask for it concurrently. Upstream
//! fetches are additionally capped at [`TIMELINE_FETCH_CONCURRENCY`] run-wide.
//!
//! Once a destination's timeline is cached, the correlation decision for it
//! is never revisited within the run.

use std::sync::Arc;

use graph::{IssueSource, NodeKey, SourceError, TimelineEvent};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::TIMELINE_FETCH_CONCURRENCY;
use crate::context::until_cancelled;
use crate::single_flight::{FlightStats, SingleFlight};

/// Coalesced, cached access to destination timelines.
pub struct TimelineResolver {
    source: Arc<dyn IssueSource>,
    cancel: CancellationToken,
    permits: Semaphore,
    flights: SingleFlight<NodeKey, Arc<[TimelineEvent]>>,
}

impl TimelineResolver {
    /// Creates a resolver reading from `source`.
    pub fn new(source: Arc<dyn IssueSource>, cancel: CancellationToken) -> Self {
        Self {
            source,
            cancel,
            permits: Semaphore::new(TIMELINE_FETCH_CONCURRENCY),
            flights: SingleFlight::new(),
        }
    }

    /// Returns the linking events on `destination`'s timeline.
    ///
    /// Served from cache when possible; otherwise joins an in-flight fetch or
    /// starts one.
    pub async fn events(
        &self,
        destination: &NodeKey,
    ) -> Result<Arc<[TimelineEvent]>, SourceError> {
        self.flights
            .get_or_fetch(destination.clone(), || async {
                let _permit = until_cancelled(&self.cancel, async {
                    self.permits
                        .acquire()
                        .await
                        .map_err(|_| SourceError::Cancelled)
                })
                .await?;
                let events =
                    until_cancelled(&self.cancel, self.source.fetch_timeline(destination)).await?;
                Ok(Arc::from(events))
            })
            .await
    }

    /// Returns the first event on `destination`'s timeline that records a
    /// reference from `source`, in upstream order.
    ///
    /// A failed timeline fetch yields `None`; the edge keeps its free-text
    /// provenance and a later lookup may retry.
    pub async fn correlate(
        &self,
        source: &NodeKey,
        destination: &NodeKey,
    ) -> Option<TimelineEvent> {
        match self.events(destination).await {
            Ok(events) => events
                .iter()
                .find(|event| event.correlates_with(source, &destination.repository))
                .cloned(),
            Err(error) => {
                debug!(%source, %destination, %error, "Timeline unavailable; correlation skipped");
                None
            }
        }
    }

    /// Lookup counters for this run.
    pub fn stats(&self) -> FlightStats {
        self.flights.stats()
    }
}
