//! Request coalescing with a success-only cache.
//!
//! [`SingleFlight`] maps a key to either a cached value or the shared result
//! slot of the fetch currently in flight for it. The first caller for a key
//! becomes the owner and runs the fetch; concurrent callers subscribe to the
//! owner's slot and receive a clone of its result.
//!
//! Only successes are cached. A failure is delivered to the callers waiting
//! at that moment and the key is released, so a later caller fetches again.
//!
//! If the owner is dropped mid-fetch (its task was cancelled), the in-flight
//! entry is removed and every waiter resolves to [`SourceError::Cancelled`]
//! instead of waiting forever.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use graph::SourceError;
use parking_lot::Mutex;
use tokio::sync::watch;

type Slot<V> = Option<Result<V, SourceError>>;

struct FlightState<K, V> {
    cache: HashMap<K, V>,
    in_flight: HashMap<K, watch::Receiver<Slot<V>>>,
}

enum Role<V> {
    Cached(V),
    Waiter(watch::Receiver<Slot<V>>),
    Owner(watch::Sender<Slot<V>>),
}

/// Counters describing how lookups were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightStats {
    /// Fetches actually issued.
    pub fetches: usize,
    /// Lookups answered from the cache.
    pub cache_hits: usize,
    /// Lookups that joined a fetch already in flight.
    pub coalesced: usize,
}

/// Keyed single-flight cache. See the module docs.
pub struct SingleFlight<K, V> {
    state: Mutex<FlightState<K, V>>,
    fetches: AtomicUsize,
    cache_hits: AtomicUsize,
    coalesced: AtomicUsize,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FlightState {
                cache: HashMap::new(),
                in_flight: HashMap::new(),
            }),
            fetches: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            coalesced: AtomicUsize::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, running `fetch` only if no cached value
    /// exists and no other caller is already fetching it.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, SourceError>>,
    {
        let role = {
            let mut state = self.state.lock();
            if let Some(value) = state.cache.get(&key) {
                Role::Cached(value.clone())
            } else if let Some(rx) = state.in_flight.get(&key) {
                Role::Waiter(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(key.clone(), rx);
                Role::Owner(tx)
            }
        };

        match role {
            Role::Cached(value) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Role::Waiter(mut rx) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                match rx.wait_for(Option::is_some).await {
                    Ok(slot) => slot.clone().unwrap_or(Err(SourceError::Cancelled)),
                    // Owner dropped without publishing.
                    Err(_) => Err(SourceError::Cancelled),
                }
            }
            Role::Owner(tx) => {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                let mut guard = InFlightGuard {
                    flight: self,
                    key: Some(key),
                };

                let result = fetch().await;

                if let Some(key) = guard.key.take() {
                    let mut state = self.state.lock();
                    state.in_flight.remove(&key);
                    if let Ok(value) = &result {
                        state.cache.insert(key, value.clone());
                    }
                }
                // No receivers left is fine: every waiter may have been cancelled.
                let _ = tx.send(Some(result.clone()));
                result
            }
        }
    }

    /// Returns `true` if a value for `key` is cached.
    pub fn is_cached(&self, key: &K) -> bool {
        self.state.lock().cache.contains_key(key)
    }

    /// Returns `true` if a fetch for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    /// Snapshot of the lookup counters.
    pub fn stats(&self) -> FlightStats {
        FlightStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

/// Releases the in-flight registration if the owner never completes.
struct InFlightGuard<'a, K, V>
where
    K: Eq + Hash,
{
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
}

impl<K, V> Drop for InFlightGuard<'_, K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.flight.state.lock().in_flight.remove(&key);
        }
    }
}
