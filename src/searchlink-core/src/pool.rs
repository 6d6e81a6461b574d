//! Endpoint pool with caller-reported liveness
//!
//! Endpoints live in exactly one of two lists: `live`, from which requests are
//! served, and `dead`, ordered oldest-revival-first. A dead endpoint is held out
//! of rotation until its revival time passes, after which the next `get` moves
//! it back to `live`. When nothing is live, a random dead endpoint is handed out
//! so a total outage can still recover without waiting for the timers.
//!
//! The pool never health-checks endpoints itself. Two callers testing a flapping
//! endpoint may report `mark_dead` and `mark_live` close together; whichever
//! call lands last wins.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Base address of one service node, such as `http://search-1.internal:9200`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self(url.trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Endpoint::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Endpoint::new(url)
    }
}

/// Longest time an endpoint is held out of rotation; longer delays are clamped
pub const MAX_REVIVAL_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// An endpoint handed out by [`EndpointPool::get`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick<E> {
    pub endpoint: E,
    /// True when every endpoint was dead and this one came from the dead list
    pub was_dead: bool,
}

/// Copy of the pool's lists at one instant, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot<E> {
    pub live: Vec<E>,
    /// Oldest revival first
    pub dead: Vec<E>,
}

#[derive(Debug)]
struct DeadEntry<E> {
    endpoint: E,
    revive_at: Instant,
}

#[derive(Debug)]
struct PoolState<E> {
    live: Vec<E>,
    dead: VecDeque<DeadEntry<E>>,
}

/// Thread-safe live/dead bookkeeping for a fixed set of endpoints.
///
/// Every operation takes one lock for list bookkeeping only; callers do their
/// network I/O outside of it.
#[derive(Debug)]
pub struct EndpointPool<E = Endpoint> {
    state: Mutex<PoolState<E>>,
    revival_delay: Duration,
}

impl<E: Clone + PartialEq> EndpointPool<E> {
    pub fn new(endpoints: impl IntoIterator<Item = E>, revival_delay: Duration) -> Self {
        let mut live: Vec<E> = Vec::new();
        for endpoint in endpoints {
            if !live.contains(&endpoint) {
                live.push(endpoint);
            }
        }

        Self {
            state: Mutex::new(PoolState {
                live,
                dead: VecDeque::new(),
            }),
            revival_delay: revival_delay.min(MAX_REVIVAL_DELAY),
        }
    }

    pub fn revival_delay(&self) -> Duration {
        self.revival_delay
    }

    /// Hand out an endpoint, preferring live ones. `None` only for an empty pool.
    pub fn get(&self) -> Option<Pick<E>> {
        self.get_at(Instant::now())
    }

    /// [`get`](Self::get) against an explicit clock.
    pub fn get_at(&self, now: Instant) -> Option<Pick<E>> {
        let mut state = self.lock();

        let mut revived = 0usize;
        while state.dead.front().is_some_and(|entry| entry.revive_at <= now) {
            if let Some(entry) = state.dead.pop_front() {
                state.live.push(entry.endpoint);
                revived += 1;
            }
        }
        if revived > 0 {
            tracing::debug!(revived, "Returned endpoints to rotation after revival delay");
        }

        let mut rng = rand::rng();
        if let Some(endpoint) = state.live.choose(&mut rng) {
            return Some(Pick {
                endpoint: endpoint.clone(),
                was_dead: false,
            });
        }

        // Total outage: O(n) pick among the dead
        if state.dead.is_empty() {
            return None;
        }
        let index = rng.random_range(0..state.dead.len());
        state.dead.get(index).map(|entry| Pick {
            endpoint: entry.endpoint.clone(),
            was_dead: true,
        })
    }

    /// Take a live endpoint out of rotation for the revival delay.
    ///
    /// Returns false when the endpoint was not live: another caller already
    /// marked it dead, or it was handed out from the dead list. Its existing
    /// revival time is left alone.
    pub fn mark_dead(&self, endpoint: &E) -> bool {
        self.mark_dead_at(endpoint, Instant::now())
    }

    /// [`mark_dead`](Self::mark_dead) against an explicit clock.
    pub fn mark_dead_at(&self, endpoint: &E, now: Instant) -> bool {
        let mut state = self.lock();
        let Some(position) = state.live.iter().position(|e| e == endpoint) else {
            return false;
        };
        let endpoint = state.live.swap_remove(position);
        // An instant this close to the clock's limit cannot be pushed out further
        let revive_at = now.checked_add(self.revival_delay).unwrap_or(now);
        state.dead.push_back(DeadEntry { endpoint, revive_at });
        true
    }

    /// Reinstate a dead endpoint immediately, bypassing its timer.
    ///
    /// Returns false when the endpoint was not dead (already revived).
    pub fn mark_live(&self, endpoint: &E) -> bool {
        let mut state = self.lock();
        let Some(position) = state.dead.iter().position(|entry| entry.endpoint == *endpoint)
        else {
            return false;
        };
        match state.dead.remove(position) {
            Some(entry) => {
                state.live.push(entry.endpoint);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot<E> {
        let state = self.lock();
        PoolSnapshot {
            live: state.live.clone(),
            dead: state.dead.iter().map(|entry| entry.endpoint.clone()).collect(),
        }
    }

    pub fn live_len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn dead_len(&self) -> usize {
        self.lock().dead.len()
    }

    pub fn len(&self) -> usize {
        let state = self.lock();
        state.live.len() + state.dead.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every mutation leaves both lists consistent, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, PoolState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
