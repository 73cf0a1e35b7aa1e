//! Pool of exchange backing buffers.
//!
//! Every index scan allocates one exchange, so the backing slot arrays of the
//! standard capacity are recycled rather than freed. The pool only holds
//! empty arrays; a slab whose length no longer matches the requested
//! capacity (the standard capacity changed in the interim) is dropped on
//! the way out.

use crate::entry::IndexEntry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Backing slot array of an exchange.
pub(crate) type Slots = Vec<Option<IndexEntry>>;

/// Allocate a fresh slot array of `capacity` empty slots.
pub(crate) fn carve(capacity: usize) -> Slots {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || None);
    slots
}

/// Internally synchronized pool of empty slot arrays.
pub struct EntryPool {
    idle: Mutex<Vec<Slots>>,
    max_idle: usize,
    counters: PoolCounters,
}

struct PoolCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    returned: AtomicU64,
    discarded: AtomicU64,
}

impl EntryPool {
    /// Create a pool that keeps at most `max_idle` idle arrays.
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            counters: PoolCounters::new(),
        }
    }

    /// Take an array of exactly `capacity` slots, reusing an idle one if possible.
    pub(crate) fn get(&self, capacity: usize) -> Slots {
        let slab = self.idle.lock().pop();
        match slab {
            Some(slots) if slots.len() == capacity => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                slots
            }
            stale => {
                if let Some(stale) = stale {
                    debug!(
                        pooled = stale.len(),
                        requested = capacity,
                        "Dropping stale pooled scan buffer"
                    );
                    self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                }
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                carve(capacity)
            }
        }
    }

    /// Return an array to the pool. All slots must already be empty.
    ///
    /// Returns whether the array was kept; a full pool drops it.
    pub(crate) fn put(&self, slots: Slots) -> bool {
        debug_assert!(slots.iter().all(Option::is_none));
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(slots);
            self.counters.returned.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Record an array that was dropped instead of pooled.
    pub(crate) fn record_discard(&self) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of idle arrays currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            returned: self.counters.returned.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            idle: self.idle_count(),
        }
    }
}

impl PoolCounters {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returned: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }
}

/// Buffer pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Requests served from an idle array
    pub hits: u64,
    /// Requests that allocated a new array
    pub misses: u64,
    /// Arrays returned to the pool
    pub returned: u64,
    /// Arrays dropped (pool full, stale or non-standard size)
    pub discarded: u64,
    /// Idle arrays currently pooled
    pub idle: usize,
}
