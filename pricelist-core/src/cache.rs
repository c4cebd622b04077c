//! Single-flight TTL cache
//!
//! Memoizes the outcome of an expensive fallible computation per key.
//!
//! - A value younger than the TTL is returned without recomputing.
//! - At most one computation per key is in flight; concurrent callers for that
//!   key all await the same outcome, success or error.
//! - A failed computation leaves the previous value untouched.
//! - Computations run on their own task, so a caller that stops waiting does
//!   not cancel the work other waiters depend on.
//! - Invalidation detaches a running computation; only the newest flight for a
//!   key may store its value.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.offset) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *lock(&self.offset)
    }
}

type Flight<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

struct Slot<V> {
    entry: Option<Entry<V>>,
    in_flight: Option<(u64, Flight<V>)>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: None,
            in_flight: None,
        }
    }
}

struct State<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_flight: u64,
}

/// Keyed cache with TTL expiry and single-flight recomputation
pub struct SingleFlightCache<K, V> {
    state: Arc<Mutex<State<K, V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> Clone for SingleFlightCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<K, V> Default for SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                slots: HashMap::new(),
                next_flight: 0,
            })),
            clock,
        }
    }

    /// Return the cached value for `key` if younger than `ttl`, otherwise run
    /// (or join) the computation.
    ///
    /// `compute` is only called when this caller starts a new flight. It must
    /// return its future without doing work synchronously.
    pub async fn get_or_compute<F, Fut>(&self, key: K, ttl: Duration, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let flight = {
            let mut state = lock(&self.state);
            let now = self.clock.now();
            let next_flight = state.next_flight;
            let slot = state.slots.entry(key.clone()).or_default();

            if let Some(entry) = &slot.entry {
                let age = now.saturating_duration_since(entry.stored_at);
                if age < ttl {
                    debug!("Cache hit for {:?} (age: {:?})", key, age);
                    return Ok(entry.value.clone());
                }
            }

            if let Some((_, flight)) = &slot.in_flight {
                debug!("Joining in-flight computation for {:?}", key);
                flight.clone()
            } else {
                debug!("Cache miss for {:?}, computing", key);
                let flight = self.launch(key, next_flight, compute());
                slot.in_flight = Some((next_flight, flight.clone()));
                state.next_flight += 1;
                flight
            }
        };

        flight.await
    }

    fn launch<Fut>(&self, key: K, id: u64, fut: Fut) -> Flight<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let outcome = fut.await;

            let mut state = lock(&state);
            if let Some(slot) = state.slots.get_mut(&task_key) {
                if !matches!(slot.in_flight, Some((current, _)) if current == id) {
                    debug!("Discarding superseded result for {:?}", task_key);
                    return outcome;
                }
                slot.in_flight = None;
                match &outcome {
                    // value and timestamp land in one write under the lock
                    Ok(value) => {
                        slot.entry = Some(Entry {
                            value: value.clone(),
                            stored_at: clock.now(),
                        })
                    }
                    Err(e) => warn!("Recomputing {:?} failed, keeping previous value: {}", task_key, e),
                }
            }
            outcome
        });

        let state = Arc::clone(&self.state);
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let mut state = lock(&state);
                    if let Some(slot) = state.slots.get_mut(&key) {
                        if matches!(slot.in_flight, Some((current, _)) if current == id) {
                            slot.in_flight = None;
                        }
                    }
                    Err(CatalogError::Internal(format!(
                        "Computation for {key:?} did not complete: {join_error}"
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Last stored value for `key`, regardless of age
    pub fn peek(&self, key: &K) -> Option<V> {
        lock(&self.state)
            .slots
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| entry.value.clone())
    }

    /// Age of the stored value for `key`
    pub fn age(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        lock(&self.state)
            .slots
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| now.saturating_duration_since(entry.stored_at))
    }

    /// Expire the value for `key` so the next access recomputes.
    ///
    /// A computation already in flight is detached: its current waiters still
    /// receive its outcome, but it is not stored and later callers start a
    /// fresh one.
    pub fn invalidate(&self, key: &K) {
        if let Some(slot) = lock(&self.state).slots.get_mut(key) {
            slot.entry = None;
            slot.in_flight = None;
        }
    }

    /// Expire every stored value and detach every in-flight computation
    pub fn invalidate_all(&self) {
        for slot in lock(&self.state).slots.values_mut() {
            slot.entry = None;
            slot.in_flight = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
