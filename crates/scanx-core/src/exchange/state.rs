//! Per-role scan state and the waiter queues it is linked into.
//!
//! Each side of an exchange (reader, writer) owns one [`ScanState`]: its
//! cancellation flags and a condition variable to park on, behind a lock of
//! its own. The queue linkage of a role lives next to the ring buffer and is
//! only touched under the exchange lock, so a waiter is linked and unlinked
//! without allocating.

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Side of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Reader,
    Writer,
}

impl Role {
    pub(crate) const ALL: [Role; 2] = [Role::Reader, Role::Writer];

    fn index(self) -> usize {
        match self {
            Role::Reader => 0,
            Role::Writer => 1,
        }
    }
}

/// Queue linkage of one role.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Link {
    prev: Option<Role>,
    next: Option<Role>,
    queued: bool,
}

/// Linkage of every role, indexed by role.
#[derive(Debug, Default)]
pub(crate) struct Links([Link; 2]);

impl Links {
    fn get(&self, role: Role) -> Link {
        self.0[role.index()]
    }

    fn get_mut(&mut self, role: Role) -> &mut Link {
        &mut self.0[role.index()]
    }

    pub(crate) fn is_queued(&self, role: Role) -> bool {
        self.get(role).queued
    }
}

/// FIFO of parked roles, as a doubly-linked list threaded through [`Links`].
#[derive(Debug, Default)]
pub(crate) struct WaiterQueue {
    head: Option<Role>,
    tail: Option<Role>,
}

impl WaiterQueue {
    /// Oldest parked role.
    pub(crate) fn head(&self) -> Option<Role> {
        self.head
    }

    /// Append `role`. A role already queued keeps its place.
    pub(crate) fn push_back(&mut self, links: &mut Links, role: Role) {
        if links.is_queued(role) {
            return;
        }
        *links.get_mut(role) = Link {
            prev: self.tail,
            next: None,
            queued: true,
        };
        match self.tail {
            Some(tail) => links.get_mut(tail).next = Some(role),
            None => self.head = Some(role),
        }
        self.tail = Some(role);
    }

    /// Unlink `role` if it is queued.
    pub(crate) fn remove(&mut self, links: &mut Links, role: Role) {
        let link = links.get(role);
        if !link.queued {
            return;
        }
        match link.prev {
            Some(prev) => links.get_mut(prev).next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => links.get_mut(next).prev = link.prev,
            None => self.tail = link.prev,
        }
        *links.get_mut(role) = Link::default();
    }

    /// Roles in arrival order.
    pub(crate) fn roles<'a>(&self, links: &'a Links) -> impl Iterator<Item = Role> + 'a {
        std::iter::successors(self.head, move |role| links.get(*role).next)
    }

    pub(crate) fn clear(&mut self, links: &mut Links) {
        while let Some(head) = self.head {
            self.remove(links, head);
        }
    }
}

/// Flags of one role, guarded by the role lock.
#[derive(Debug, Default)]
pub(crate) struct ScanFlags {
    pub(crate) stop: bool,
    pub(crate) timeout: bool,
    /// Callers currently parked under this role
    pub(crate) parked: usize,
    /// Wakeups granted and not yet consumed
    wakeups: usize,
}

impl ScanFlags {
    pub(crate) fn cancelled(&self) -> bool {
        self.stop || self.timeout
    }
}

/// Cancellation and parking state of one role.
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    flags: Mutex<ScanFlags>,
    wake: Condvar,
}

impl ScanState {
    pub(crate) fn lock(&self) -> MutexGuard<'_, ScanFlags> {
        self.flags.lock()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.flags.lock().stop
    }

    pub(crate) fn send_stop(&self) {
        let mut flags = self.flags.lock();
        flags.stop = true;
        self.wake.notify_all();
    }

    pub(crate) fn send_timeout(&self) {
        let mut flags = self.flags.lock();
        flags.timeout = true;
        self.wake.notify_all();
    }

    /// Wake one parked caller, unless every parked caller already has a wakeup.
    pub(crate) fn signal(&self) {
        let mut flags = self.flags.lock();
        if flags.wakeups < flags.parked {
            flags.wakeups += 1;
            self.wake.notify_one();
        }
    }

    /// Wake every parked caller.
    pub(crate) fn signal_all(&self) {
        let mut flags = self.flags.lock();
        if flags.parked > 0 {
            flags.wakeups = flags.parked;
            self.wake.notify_all();
        }
    }

    /// Park until signalled, stopped or timed out.
    ///
    /// `flags` must be this state's guard, taken while the exchange lock was
    /// held and with the caller already linked into its waiter queue. The
    /// exchange lock must be released before calling.
    pub(crate) fn park(&self, flags: &mut MutexGuard<'_, ScanFlags>) {
        flags.parked += 1;
        while flags.wakeups == 0 && !flags.cancelled() {
            self.wake.wait(flags);
        }
        if flags.wakeups > 0 && !flags.cancelled() {
            flags.wakeups -= 1;
        }
        flags.parked -= 1;
        flags.wakeups = flags.wakeups.min(flags.parked);
    }

    pub(crate) fn reset(&mut self) {
        *self.flags.get_mut() = ScanFlags::default();
    }
}
