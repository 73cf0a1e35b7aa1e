//! Bounded entry exchange between index producers and scan consumers.
//!
//! Every index scan moves its results through one [`EntryExchange`]: the
//! index sends entries, the execution operator receives them, and either
//! side can be cancelled from the outside.

mod entry_exchange;
pub(crate) mod pool;
mod state;

pub use entry_exchange::EntryExchange;
pub use pool::{EntryPool, PoolStats};

use crate::entry::IndexEntry;

/// Outcome of receiving from an exchange.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Received {
    /// The next entry of the scan
    Entry(IndexEntry),
    /// The producer closed and every entry has been received
    EndOfScan,
    /// The scan was stopped or timed out before the end
    Stopped,
}

impl Received {
    /// `false` only when the scan was cancelled.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Received::Stopped)
    }

    /// The received entry, if any.
    pub fn entry(&self) -> Option<&IndexEntry> {
        match self {
            Received::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// Take the received entry, if any.
    pub fn into_entry(self) -> Option<IndexEntry> {
        match self {
            Received::Entry(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Capabilities shared by both ends of a scan.
///
/// The index sends and closes; the operator receives and closes. Waiter
/// bookkeeping stays inside the exchange.
pub trait Sender: Send + Sync {
    /// Send an entry; `false` means stop producing.
    fn send_entry(&self, item: IndexEntry) -> bool;

    /// Receive the next entry.
    fn get_entry(&self) -> Received;

    /// Close this side of the scan.
    fn close(&self);

    /// Number of slots.
    fn capacity(&self) -> usize;

    /// Number of queued entries.
    fn length(&self) -> usize;

    /// Whether the scan has been stopped.
    fn is_stopped(&self) -> bool;
}
