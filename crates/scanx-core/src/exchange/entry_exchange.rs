//! Bounded entry exchange between one index scan producer and its consumer.
//!
//! The ring buffer and both waiter queues sit behind a single exchange lock;
//! each role's cancellation flags sit behind that role's own lock. Lock order
//! is always exchange lock first, role lock second. A blocked caller links
//! its role into the matching waiter queue, releases the exchange lock and
//! parks on the role's condition variable. The opposite side wakes the head
//! of the queue after changing the buffer, and a second waiter when there is
//! room (or data) left for it.
//!
//! ## Close protocol
//!
//! Both sides call [`close`](EntryExchange::close) exactly once. The first
//! call marks the exchange closed and wakes everyone; the second disposes of
//! the backing buffer, returning it to the pool when it has the standard
//! scan capacity.

use super::pool::Slots;
use super::state::{Links, Role, ScanFlags, ScanState, WaiterQueue};
use super::{Received, Sender};
use crate::entry::IndexEntry;
use crate::settings::ScanSettings;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ring buffer state guarded by the exchange lock.
struct Ring {
    items: Slots,
    head: usize,
    tail: usize,
    count: usize,
    /// Entries inserted and removed since construction or reset
    pushed: u64,
    popped: u64,
    closed: bool,
    disposed: bool,
    read_waiters: WaiterQueue,
    write_waiters: WaiterQueue,
    links: Links,
}

impl Ring {
    fn new(items: Slots) -> Self {
        Self {
            items,
            head: 0,
            tail: 0,
            count: 0,
            pushed: 0,
            popped: 0,
            closed: false,
            disposed: false,
            read_waiters: WaiterQueue::default(),
            write_waiters: WaiterQueue::default(),
            links: Links::default(),
        }
    }

    fn is_full(&self) -> bool {
        self.count >= self.items.len()
    }

    /// Insert at head; returns the sequence number of the entry.
    fn push(&mut self, item: IndexEntry) -> u64 {
        let capacity = self.items.len();
        self.items[self.head] = Some(item);
        self.head = (self.head + 1) % capacity;
        self.count += 1;
        self.pushed += 1;
        self.pushed
    }

    /// Remove from tail.
    fn pop(&mut self) -> Option<IndexEntry> {
        let capacity = self.items.len();
        let item = self.items[self.tail].take();
        self.tail = (self.tail + 1) % capacity;
        self.count -= 1;
        self.popped += 1;
        item
    }

    /// Drop every queued entry.
    fn drain(&mut self) {
        while self.count > 0 {
            self.pop();
        }
        self.head = 0;
        self.tail = 0;
    }

    fn waiters(&self, role: Role) -> &WaiterQueue {
        match role {
            Role::Reader => &self.read_waiters,
            Role::Writer => &self.write_waiters,
        }
    }

    fn enqueue(&mut self, role: Role) {
        let queue = match role {
            Role::Reader => &mut self.read_waiters,
            Role::Writer => &mut self.write_waiters,
        };
        queue.push_back(&mut self.links, role);
    }

    fn dequeue(&mut self, role: Role) {
        let queue = match role {
            Role::Reader => &mut self.read_waiters,
            Role::Writer => &mut self.write_waiters,
        };
        queue.remove(&mut self.links, role);
    }
}

/// Bounded, cancellable FIFO of index entries.
pub struct EntryExchange {
    ring: Mutex<Ring>,
    reader: ScanState,
    writer: ScanState,
    closes: AtomicU32,
    capacity: usize,
    settings: Arc<ScanSettings>,
}

impl EntryExchange {
    /// Create an exchange of `capacity` slots (at least one).
    ///
    /// The backing buffer comes from the settings' pool when `capacity` is
    /// the standard scan capacity.
    pub fn new(capacity: usize, settings: Arc<ScanSettings>) -> Self {
        let capacity = capacity.max(1);
        let items = settings.acquire(capacity);
        Self {
            ring: Mutex::new(Ring::new(items)),
            reader: ScanState::default(),
            writer: ScanState::default(),
            closes: AtomicU32::new(0),
            capacity,
            settings,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued entries.
    pub fn length(&self) -> usize {
        self.ring.lock().count
    }

    /// Send an entry, blocking while the exchange is full.
    ///
    /// Returns `false` when the writer was stopped or timed out, or the
    /// exchange is closed; the producer must stop producing. A pending
    /// timeout is consumed by the call that observes it. With a capacity of
    /// one the call returns only once the entry has been received.
    pub fn send_entry(&self, item: IndexEntry) -> bool {
        if self.writer.is_stopped() {
            return false;
        }
        let mut ring = self.ring.lock();
        loop {
            let mut flags = self.writer.lock();
            if flags.cancelled() {
                flags.timeout = false;
                return false;
            }

            // closed means stopped: nothing is listening any more
            if ring.closed {
                drop(flags);
                self.signal(&ring, Role::Reader);
                self.signal(&ring, Role::Writer);
                return false;
            }
            if !ring.is_full() {
                break;
            }
            ring = self.park(ring, flags, Role::Writer);
        }

        let ticket = ring.push(item);
        self.signal(&ring, Role::Reader);
        if !ring.is_full() {
            self.signal(&ring, Role::Writer);
        }
        if self.capacity == 1 {
            return self.await_handoff(ring, ticket);
        }
        true
    }

    /// Receive the next entry, blocking while the exchange is empty.
    pub fn get_entry(&self) -> Received {
        if self.reader.is_stopped() {
            return Received::Stopped;
        }
        let mut ring = self.ring.lock();
        loop {
            let mut flags = self.reader.lock();
            if flags.cancelled() {
                flags.timeout = false;
                return Received::Stopped;
            }
            if ring.count > 0 {
                break;
            }
            if ring.closed {
                drop(flags);
                self.signal(&ring, Role::Reader);
                self.signal(&ring, Role::Writer);
                return Received::EndOfScan;
            }
            ring = self.park(ring, flags, Role::Reader);
        }

        let item = ring.pop();
        if self.capacity == 1 {
            // writers awaiting a handoff and writers awaiting the slot share
            // one queue entry; each must re-check its own condition
            self.signal_all(&ring, Role::Writer);
        } else {
            self.signal(&ring, Role::Writer);
        }
        if ring.count > 0 {
            self.signal(&ring, Role::Reader);
        }
        match item {
            Some(entry) => Received::Entry(entry),
            None => Received::EndOfScan,
        }
    }

    /// Close one side of the exchange.
    ///
    /// Expected exactly twice, once per side: the first call means no more
    /// data, the second that nobody is left and the buffer can be reclaimed.
    pub fn close(&self) {
        let closes = self.closes.fetch_add(1, Ordering::AcqRel) + 1;
        match closes {
            1 => self.shut(),
            2 => self.dispose(),
            _ => {
                warn!(closes, "Entry exchange closed more than twice");
                debug_assert!(false, "entry exchange closed {closes} times");
            }
        }
    }

    /// Whether the first close has happened.
    pub fn is_closed(&self) -> bool {
        self.ring.lock().closed
    }

    /// Whether the second close has reclaimed the buffer.
    pub fn is_disposed(&self) -> bool {
        self.ring.lock().disposed
    }

    /// Whether the reader side has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.reader.is_stopped()
    }

    /// Stop both sides and wake them.
    pub fn send_stop(&self) {
        self.reader.send_stop();
        self.writer.send_stop();
    }

    /// Time the writer out and wake it.
    pub fn send_timeout(&self) {
        self.writer.send_timeout();
    }

    /// Restore factory defaults so the exchange can serve a new scan.
    ///
    /// Exclusive access guarantees no reader or writer is still around. An
    /// exchange that was already disposed gets a fresh backing buffer.
    pub fn reset(&mut self) {
        let ring = self.ring.get_mut();
        ring.drain();
        ring.pushed = 0;
        ring.popped = 0;
        ring.closed = false;
        ring.disposed = false;
        ring.read_waiters.clear(&mut ring.links);
        ring.write_waiters.clear(&mut ring.links);
        if ring.items.is_empty() {
            ring.items = self.settings.acquire(self.capacity);
        }
        self.reader.reset();
        self.writer.reset();
        *self.closes.get_mut() = 0;
    }

    fn state(&self, role: Role) -> &ScanState {
        match role {
            Role::Reader => &self.reader,
            Role::Writer => &self.writer,
        }
    }

    /// Wake the oldest waiter of `role`'s queue, if any.
    fn signal(&self, ring: &Ring, role: Role) {
        if let Some(waiter) = ring.waiters(role).head() {
            self.state(waiter).signal();
        }
    }

    /// Wake every waiter parked under `role`'s queue.
    fn signal_all(&self, ring: &Ring, role: Role) {
        for waiter in ring.waiters(role).roles(&ring.links) {
            self.state(waiter).signal_all();
        }
    }

    /// Link `role` into its queue, release both locks and wait.
    ///
    /// Comes back holding the exchange lock only; the caller re-takes the
    /// role lock before inspecting its flags.
    fn park<'a>(
        &'a self,
        mut ring: MutexGuard<'a, Ring>,
        mut flags: MutexGuard<'a, ScanFlags>,
        role: Role,
    ) -> MutexGuard<'a, Ring> {
        let state = self.state(role);
        ring.enqueue(role);
        drop(ring);
        state.park(&mut flags);
        drop(flags);

        let mut ring = self.ring.lock();
        if state.lock().parked == 0 {
            ring.dequeue(role);
        }
        ring
    }

    /// Rendezvous: wait until the entry numbered `ticket` has been received.
    fn await_handoff<'a>(&'a self, mut ring: MutexGuard<'a, Ring>, ticket: u64) -> bool {
        loop {
            if ring.popped >= ticket {
                return true;
            }
            let mut flags = self.writer.lock();
            if flags.cancelled() {
                flags.timeout = false;
                return false;
            }
            if ring.closed {
                return false;
            }
            ring = self.park(ring, flags, Role::Writer);
        }
    }

    fn shut(&self) {
        let mut guard = self.ring.lock();
        guard.closed = true;

        // wake any readers and writers
        for role in Role::ALL {
            self.signal_all(&guard, role);
        }
    }

    fn dispose(&self) {
        let slots = {
            let mut ring = self.ring.lock();
            ring.drain();
            ring.closed = true;
            ring.disposed = true;
            std::mem::take(&mut ring.items)
        };
        let pooled = self.settings.release(slots);
        debug!(capacity = self.capacity, pooled, "Entry exchange disposed");
    }
}

impl Sender for EntryExchange {
    fn send_entry(&self, item: IndexEntry) -> bool {
        EntryExchange::send_entry(self, item)
    }

    fn get_entry(&self) -> Received {
        EntryExchange::get_entry(self)
    }

    fn close(&self) {
        EntryExchange::close(self)
    }

    fn capacity(&self) -> usize {
        EntryExchange::capacity(self)
    }

    fn length(&self) -> usize {
        EntryExchange::length(self)
    }

    fn is_stopped(&self) -> bool {
        EntryExchange::is_stopped(self)
    }
}

impl std::fmt::Debug for EntryExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("EntryExchange")
            .field("capacity", &self.capacity)
            .field("length", &ring.count)
            .field("closed", &ring.closed)
            .field("disposed", &ring.disposed)
            .finish()
    }
}
