//! Index connection: one scan's exchange bound to its request context.
//!
//! The connection is created by the operator that wants the scan, handed to
//! the index that produces it, and shared by both for the scan's lifetime.
//! Both ends talk through [`IndexConnection::sender`]; whoever controls the
//! request can cancel with [`send_stop`](IndexConnection::send_stop) or
//! [`send_timeout`](IndexConnection::send_timeout).

use crate::error::ScanError;
use crate::exchange::{EntryExchange, Sender};
use crate::settings::ScanSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Request-scoped services a scan reports to.
pub trait Context: Send + Sync {
    /// Requested exchange capacity; non-positive selects the process default.
    fn scan_cap(&self) -> i64 {
        0
    }

    /// Request deadline, if any. Advisory: enforcing it is up to the caller.
    fn req_deadline(&self) -> Option<Instant> {
        None
    }

    /// Report an error that ends the request.
    fn fatal(&self, err: ScanError);

    /// Report an error; the request may carry on.
    fn error(&self, err: ScanError);

    /// Report a warning.
    fn warning(&self, wrn: ScanError);

    /// Whether a sequential scan should skip `key`.
    fn skip_key(&self, _key: &str) -> bool {
        false
    }
}

/// One scan's exchange plus the context it reports to.
pub struct IndexConnection {
    exchange: EntryExchange,
    context: Arc<dyn Context>,
    saw_timeout: AtomicBool,
    primary: bool,
    skip_new_keys: bool,
    skip_metering: bool,
}

impl IndexConnection {
    /// Create a connection sized from the context's scan cap.
    ///
    /// A non-positive request selects the process scan cap; anything larger
    /// than the process scan cap is clamped to it.
    pub fn new(settings: &Arc<ScanSettings>, context: Arc<dyn Context>) -> Self {
        let scan_cap = settings.scan_cap();
        let requested = context.scan_cap();
        let capacity = if requested <= 0 {
            scan_cap
        } else {
            usize::try_from(requested).map_or(scan_cap, |requested| requested.min(scan_cap))
        };
        Self::with_capacity(capacity, settings, context)
    }

    /// Create a connection of an explicit size, clamped to the process scan cap.
    ///
    /// Fails with [`ScanError::InvalidScanSize`] for a non-positive size.
    pub fn sized(
        size: i64,
        settings: &Arc<ScanSettings>,
        context: Arc<dyn Context>,
    ) -> Result<Self, ScanError> {
        if size <= 0 {
            return Err(ScanError::InvalidScanSize(size));
        }
        let scan_cap = settings.scan_cap();
        let capacity = usize::try_from(size).map_or(scan_cap, |size| size.clamp(1, scan_cap));
        Ok(Self::with_capacity(capacity, settings, context))
    }

    /// Create a single-slot connection: every send waits for its receive.
    pub fn rendezvous(settings: &Arc<ScanSettings>, context: Arc<dyn Context>) -> Self {
        Self::with_capacity(1, settings, context)
    }

    fn with_capacity(
        capacity: usize,
        settings: &Arc<ScanSettings>,
        context: Arc<dyn Context>,
    ) -> Self {
        Self {
            exchange: EntryExchange::new(capacity, Arc::clone(settings)),
            context,
            saw_timeout: AtomicBool::new(false),
            primary: false,
            skip_new_keys: false,
            skip_metering: false,
        }
    }

    /// Builder-style: mark as a primary index scan that may fall back on timeout.
    pub fn with_primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Builder-style: skip keys inserted after the scan started.
    pub fn with_skip_new_keys(mut self, skip: bool) -> Self {
        self.skip_new_keys = skip;
        self
    }

    /// Builder-style: do not meter this scan.
    pub fn with_skip_metering(mut self, skip: bool) -> Self {
        self.skip_metering = skip;
        self
    }

    /// Send/receive view used by both ends of the scan.
    pub fn sender(&self) -> &dyn Sender {
        &self.exchange
    }

    /// Stop both ends.
    pub fn send_stop(&self) {
        self.exchange.send_stop();
    }

    /// Time out the producer.
    pub fn send_timeout(&self) {
        self.exchange.send_timeout();
    }

    /// Close the exchange once on behalf of the connection holder.
    pub fn dispose(&self) {
        self.exchange.close();
    }

    /// Restore factory defaults for reuse; nobody else may hold the connection.
    pub fn reset(&mut self) {
        self.exchange.reset();
        *self.saw_timeout.get_mut() = false;
    }

    /// The request context this connection reports to.
    pub fn context(&self) -> &dyn Context {
        self.context.as_ref()
    }

    /// Deadline of the request, if it has one.
    pub fn req_deadline(&self) -> Option<Instant> {
        self.context.req_deadline()
    }

    /// Whether this is a primary index scan.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Whether keys inserted after the scan started are skipped.
    pub fn skip_new_keys(&self) -> bool {
        self.skip_new_keys
    }

    /// Whether metering is off for this scan.
    pub fn skip_metering(&self) -> bool {
        self.skip_metering
    }

    /// Whether the context wants `key` skipped.
    pub fn skip_key(&self, key: &str) -> bool {
        self.context.skip_key(key)
    }

    /// Whether a scan timeout was swallowed on this primary scan.
    pub fn saw_timeout(&self) -> bool {
        self.saw_timeout.load(Ordering::Acquire)
    }

    /// Forward a fatal error to the context, unless already disposed.
    pub fn fatal(&self, err: ScanError) {
        if !self.exchange.is_disposed() {
            self.context.fatal(err);
        }
    }

    /// Forward an error to the context.
    ///
    /// A primary scan records scan timeouts instead, so the caller can fall
    /// back to another index.
    pub fn error(&self, err: ScanError) {
        if self.primary && err.is_scan_timeout() {
            debug!(error = %err, "Primary index scan timed out");
            self.saw_timeout.store(true, Ordering::Release);
            return;
        }
        if !self.exchange.is_disposed() {
            self.context.error(err);
        }
    }

    /// Forward a warning to the context, unless already disposed.
    pub fn warning(&self, wrn: ScanError) {
        if !self.exchange.is_disposed() {
            self.context.warning(wrn);
        }
    }
}

impl std::fmt::Debug for IndexConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConnection")
            .field("exchange", &self.exchange)
            .field("primary", &self.primary)
            .field("saw_timeout", &self.saw_timeout())
            .finish()
    }
}
