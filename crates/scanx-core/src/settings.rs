//! Process scan settings shared by every connection.
//!
//! Holds the standard scan capacity and the buffer pool keyed by it. One
//! instance is built at startup and handed to whatever creates connections.

use crate::config::{ScanConfig, DEFAULT_SCAN_CAP};
use crate::exchange::pool::{carve, EntryPool, Slots};
use parking_lot::RwLock;
use tracing::info;

/// Standard scan capacity plus the pool of backing buffers of that size.
pub struct ScanSettings {
    scan_cap: RwLock<usize>,
    pool: EntryPool,
}

impl ScanSettings {
    /// Create settings; a non-positive `scan_cap` selects the default.
    pub fn new(scan_cap: i64, max_pooled_buffers: usize) -> Self {
        Self {
            scan_cap: RwLock::new(normalize(scan_cap)),
            pool: EntryPool::new(max_pooled_buffers),
        }
    }

    /// Create settings from configuration.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.scan_cap, config.max_pooled_buffers)
    }

    /// Current standard scan capacity.
    pub fn scan_cap(&self) -> usize {
        *self.scan_cap.read()
    }

    /// Change the standard scan capacity.
    ///
    /// Buffers of the old size still out on scans are dropped when they come
    /// back, and any still idle are dropped on their next checkout.
    pub fn set_scan_cap(&self, scan_cap: i64) {
        let new_cap = normalize(scan_cap);
        let old_cap = std::mem::replace(&mut *self.scan_cap.write(), new_cap);
        if old_cap != new_cap {
            info!(old = old_cap, new = new_cap, "Scan cap changed");
        }
    }

    /// The shared buffer pool.
    pub fn pool(&self) -> &EntryPool {
        &self.pool
    }

    /// Backing buffer for an exchange of `capacity` slots.
    pub(crate) fn acquire(&self, capacity: usize) -> Slots {
        if capacity == self.scan_cap() {
            self.pool.get(capacity)
        } else {
            carve(capacity)
        }
    }

    /// Hand back the buffer of a disposed exchange.
    ///
    /// Returns whether the buffer went back into the pool.
    pub(crate) fn release(&self, slots: Slots) -> bool {
        if slots.len() == self.scan_cap() {
            self.pool.put(slots)
        } else {
            self.pool.record_discard();
            false
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl std::fmt::Debug for ScanSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSettings")
            .field("scan_cap", &self.scan_cap())
            .field("pool", &self.pool.stats())
            .finish()
    }
}

fn normalize(scan_cap: i64) -> usize {
    if scan_cap <= 0 {
        DEFAULT_SCAN_CAP as usize
    } else {
        scan_cap as usize
    }
}
