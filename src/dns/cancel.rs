//! Deferred cancellation of abandoned lookups.
//!
//! When a lookup is abandoned while its background work is still running,
//! the cancellation attempt is refused and the handle cannot be released
//! yet. It is parked here and cancellation is retried the next time a
//! bounded resolver starts a lookup. One queue is meant to be shared by
//! every resolver in the process.

use super::resolve::{CancelOutcome, PendingLookup};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Process-wide holding area for lookups whose cancellation was refused.
///
/// All access goes through one mutex. The queue never calls back into a
/// resolver while the lock is held, and draining happens only from
/// [`BoundedResolver::resolve`](super::BoundedResolver::resolve), so the
/// lock is never re-entered.
pub struct CancellationQueue {
    entries: Mutex<Vec<Box<dyn PendingLookup>>>,
    closed: AtomicBool,
}

impl CancellationQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<dyn PendingLookup>>> {
        // A panic while holding the lock cannot leave the Vec inconsistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Parks a lookup whose cancellation was refused.
    pub fn defer(&self, lookup: Box<dyn PendingLookup>) {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!("cancellation queue shut down, abandoning lookup");
            return;
        }
        let mut entries = self.lock();
        entries.push(lookup);
        tracing::debug!(pending = entries.len(), "deferred lookup cancellation");
    }

    /// Retries cancellation on every parked lookup. Lookups that now cancel
    /// are released, together with any result they produced; the rest stay
    /// queued. Returns how many remain.
    pub fn drain(&self) -> usize {
        let mut entries = self.lock();
        if entries.is_empty() {
            return 0;
        }
        let before = entries.len();
        entries.retain_mut(|lookup| lookup.cancel() == CancelOutcome::NotCanceled);
        let released = before - entries.len();
        if released > 0 {
            tracing::debug!(released, pending = entries.len(), "released deferred lookups");
        }
        entries.len()
    }

    /// Number of lookups still waiting for cancellation.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Makes a final cancellation pass and abandons whatever is still
    /// running. Lookups deferred afterwards are abandoned immediately.
    /// Returns how many lookups were abandoned.
    pub fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let remaining = self.drain();
        if remaining > 0 {
            tracing::warn!(remaining, "abandoning lookups still running at shutdown");
        }
        self.lock().clear();
        remaining
    }
}

impl Default for CancellationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationQueue")
            .field("pending", &self.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
