//! Generic memoization store with TTL freshness and single-flight fetch
//! de-duplication.
//!
//! Each key moves through `Empty -> Pending -> Fresh -> Stale -> Pending`,
//! with `Pending -> Failed -> Empty` on producer error. `Pending` is the
//! single-flight state: exactly one producer invocation exists per key while
//! a flight is up, and every concurrent caller waits on that flight's result
//! instead of starting its own.
//!
//! Eviction is pull-based: expiry is checked on access, there is no
//! background sweeper. The internal map is the only shared mutable state and
//! its lock is never held across an await point.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::errors::{DataError, DataResult};

/// What to return when a refresh fails but a superseded value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Surface the refresh error. The store never silently substitutes
    /// stale data.
    #[default]
    FailFast,
    /// Return the superseded value instead of the error, when one exists.
    ServeStale,
}

/// Result of one producer flight, shared with every waiter.
type FlightResult<V> = Result<Arc<V>, DataError>;

/// A previously fresh value retained only for the `ServeStale` policy.
type StaleValue<V> = Option<(Arc<V>, Instant)>;

enum EntryState<V> {
    /// A live value. Fresh until `created_at + ttl`, stale afterwards.
    Fresh {
        value: Arc<V>,
        created_at: Instant,
        ttl: Duration,
    },
    /// A producer flight is up. `generation` guards installs: a flight may
    /// only write its result back while its own pending entry is current.
    Pending {
        generation: u64,
        rx: watch::Receiver<Option<FlightResult<V>>>,
        stale: StaleValue<V>,
    },
    /// A flight failed. The error is held for the cooldown window so
    /// concurrent callers share it instead of hammering a failing source.
    Failed {
        error: DataError,
        failed_at: Instant,
        stale: StaleValue<V>,
    },
}

struct StoreInner<K, V> {
    entries: Mutex<HashMap<K, EntryState<V>>>,
    generation: AtomicU64,
    failure_cooldown: Duration,
}

/// Key-value cache with per-call validity windows and single-flight
/// de-duplication.
///
/// Explicitly constructed and injected, never a process global: every test
/// and every process builds its own instance. Cloning is cheap and shares
/// the underlying map.
pub struct MemoizationStore<K, V> {
    inner: Arc<StoreInner<K, V>>,
}

impl<K, V> Clone for MemoizationStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> MemoizationStore<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a store with the given failure cooldown.
    pub fn new(failure_cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                failure_cooldown,
            }),
        }
    }

    /// Get the live value for `key`, invoking `producer` at most once per
    /// validity window across all concurrent callers.
    ///
    /// Fails fast on a refresh error; see [`Self::get_with_policy`] for the
    /// stale-serving opt-in.
    pub async fn get<F, Fut>(&self, key: K, ttl: Duration, producer: F) -> DataResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DataResult<V>> + Send + 'static,
    {
        self.get_with_policy(key, ttl, StalePolicy::FailFast, producer)
            .await
    }

    /// Like [`Self::get`], with an explicit policy for failed refreshes.
    pub async fn get_with_policy<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        policy: StalePolicy,
        producer: F,
    ) -> DataResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DataResult<V>> + Send + 'static,
    {
        let mut entries = self.inner.entries.lock().await;

        match entries.get(&key) {
            Some(EntryState::Fresh {
                value,
                created_at,
                ttl: entry_ttl,
            }) if created_at.elapsed() < *entry_ttl => {
                debug!(?key, "cache hit");
                return Ok(Arc::clone(value));
            }
            Some(EntryState::Pending { rx, .. }) => {
                debug!(?key, "joining in-flight producer");
                let rx = rx.clone();
                drop(entries);
                return self.wait(key, rx, policy).await;
            }
            Some(EntryState::Failed {
                error,
                failed_at,
                stale,
            }) if failed_at.elapsed() < self.inner.failure_cooldown => {
                if policy == StalePolicy::ServeStale {
                    if let Some((value, _)) = stale {
                        return Ok(Arc::clone(value));
                    }
                }
                debug!(?key, "returning held failure during cooldown");
                return Err(error.clone());
            }
            _ => {}
        }

        // Empty, stale, or failed-past-cooldown: start a new flight. The
        // superseded value rides along so ServeStale callers can still be
        // answered if the flight fails.
        let stale = match entries.remove(&key) {
            Some(EntryState::Fresh {
                value, created_at, ..
            }) => Some((value, created_at)),
            Some(EntryState::Failed { stale, .. }) => stale,
            _ => None,
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = watch::channel(None);
        entries.insert(
            key.clone(),
            EntryState::Pending {
                generation,
                rx: rx.clone(),
                stale,
            },
        );
        drop(entries);

        debug!(?key, generation, "cache miss, starting producer flight");

        // The producer runs in its own task: a caller that abandons its wait
        // must not tear down the flight other callers depend on.
        let flight = producer();
        let inner = Arc::clone(&self.inner);
        let flight_key = key.clone();
        tokio::spawn(async move {
            let result = flight.await;
            let shared: FlightResult<V> = result.map(Arc::new);

            let mut entries = inner.entries.lock().await;
            let is_current = matches!(
                entries.get(&flight_key),
                Some(EntryState::Pending { generation: g, .. }) if *g == generation
            );
            if is_current {
                let stale = match entries.remove(&flight_key) {
                    Some(EntryState::Pending { stale, .. }) => stale,
                    _ => None,
                };
                match &shared {
                    Ok(value) => {
                        entries.insert(
                            flight_key,
                            EntryState::Fresh {
                                value: Arc::clone(value),
                                created_at: Instant::now(),
                                ttl,
                            },
                        );
                    }
                    Err(error) => {
                        warn!(?error, "producer flight failed, entering cooldown");
                        entries.insert(
                            flight_key,
                            EntryState::Failed {
                                error: error.clone(),
                                failed_at: Instant::now(),
                                stale,
                            },
                        );
                    }
                }
            } else {
                // The key was invalidated or cleared mid-flight. The result
                // still reaches the waiters, but it must not clobber a newer
                // entry.
                debug!(generation, "flight superseded, discarding install");
            }
            drop(entries);

            let _ = tx.send(Some(shared));
        });

        self.wait(key, rx, policy).await
    }

    /// Wait for an in-flight producer and return its result.
    async fn wait(
        &self,
        key: K,
        mut rx: watch::Receiver<Option<FlightResult<V>>>,
        policy: StalePolicy,
    ) -> DataResult<Arc<V>> {
        let outcome = loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                break result;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without publishing: the flight task was
                // killed mid-install. By construction this cannot happen.
                return Err(DataError::StoreCorruption(format!(
                    "flight for {key:?} closed without a result"
                )));
            }
        };

        // Freshness monotonicity: prefer whatever is installed now over the
        // flight's own result, so a slow waiter never observes a value older
        // than one another caller already saw.
        let entries = self.inner.entries.lock().await;
        if let Some(EntryState::Fresh { value, .. }) = entries.get(&key) {
            return Ok(Arc::clone(value));
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(error) => {
                if policy == StalePolicy::ServeStale {
                    if let Some(EntryState::Failed {
                        stale: Some((value, _)),
                        ..
                    }) = entries.get(&key)
                    {
                        return Ok(Arc::clone(value));
                    }
                }
                Err(error)
            }
        }
    }

    /// Remove the entry for `key`, if any. The next `get` behaves as a cold
    /// cache. An in-flight producer for the key keeps running and still
    /// answers its waiters, but its result is not installed.
    pub async fn invalidate(&self, key: &K) {
        let mut entries = self.inner.entries.lock().await;
        if entries.remove(key).is_some() {
            debug!(?key, "invalidated entry");
        }
    }

    /// Remove every entry whose key matches the predicate. Used for
    /// prefix-style invalidation, e.g. everything derived from one source.
    pub async fn invalidate_if(&self, predicate: impl Fn(&K) -> bool) {
        let mut entries = self.inner.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "invalidated entries by predicate");
        }
    }

    /// Remove every entry. Used for a forced refresh across the system.
    pub async fn clear(&self) {
        let mut entries = self.inner.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        debug!(removed, "cleared store");
    }

    /// Number of entries currently held, in any state.
    pub async fn entry_count(&self) -> usize {
        self.inner.entries.lock().await.len()
    }
}
