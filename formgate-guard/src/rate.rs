//! Per-client rate counting over a fixed tumbling window.
//!
//! The store is the only piece of state shared between requests. Each key
//! holds its own short-held lock so concurrent requests from *different*
//! clients never contend, while two concurrent requests from the *same*
//! abusive client are serialized through one atomic increment-and-read and
//! cannot both observe a stale low count.
//!
//! The window tumbles rather than slides: once `window` has elapsed since
//! the recorded start, the counter restarts at 1 with a fresh start time.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;

/// Expired entries are pruned lazily once the map grows past this.
const PRUNE_THRESHOLD: usize = 10_000;

/// Atomic increment-and-read of a per-key submission counter.
///
/// Implementations must be safe to call from concurrent request handlers.
/// The in-memory [`MemoryRateStore`] covers a single process; a deployment
/// spanning processes or hosts would put an external key-value store behind
/// this trait instead.
pub trait RateCounterStore: Send + Sync {
    /// Record one submission for `key` and return the running count within
    /// the current window, including this one.
    fn increment(&self, key: &str) -> u32;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-memory, per-process rate counter store.
#[derive(Debug)]
pub struct MemoryRateStore {
    window: Duration,
    entries: DashMap<String, Arc<parking_lot::Mutex<Window>>>,
}

impl MemoryRateStore {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    fn entry(&self, key: &str) -> Arc<parking_lot::Mutex<Window>> {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(parking_lot::Mutex::new(Window {
                    started: Instant::now(),
                    count: 0,
                }))
            })
            .clone()
    }

    /// Drop entries whose window has fully elapsed. Called opportunistically
    /// from `increment`, never on a timer.
    fn prune(&self) {
        let window = self.window;
        self.entries
            .retain(|_, entry| entry.lock().started.elapsed() <= window);
    }
}

impl RateCounterStore for MemoryRateStore {
    fn increment(&self, key: &str) -> u32 {
        if self.entries.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let entry = self.entry(key);
        let mut window = entry.lock();

        if window.started.elapsed() > self.window {
            window.started = Instant::now();
            window.count = 1;
        } else {
            window.count += 1;
        }

        window.count
    }
}
