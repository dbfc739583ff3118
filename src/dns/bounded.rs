//! Name resolution under a hard time budget.

use super::address::{Hints, ResolvedList};
use super::cancel::CancellationQueue;
use super::error::ResolverError;
use super::gai::GaiResolver;
use super::resolve::{CancelOutcome, LookupRequest, Name, PendingLookup, Resolve, Suspend};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Budgets below this are raised to it before the lookup starts.
pub const MIN_RESOLVE_BUDGET: Duration = Duration::from_millis(50);

/// Runs lookups on a [`Resolve`] backend without ever waiting past the
/// caller's budget, and without leaking lookups it abandons.
///
/// Lookups that cannot be cancelled when abandoned are parked in the shared
/// [`CancellationQueue`]; every call to [`resolve`](Self::resolve) first
/// retries cancellation on everything parked there.
#[derive(Clone)]
pub struct BoundedResolver {
    backend: Arc<dyn Resolve>,
    pending: Arc<CancellationQueue>,
}

impl BoundedResolver {
    pub fn new(backend: Arc<dyn Resolve>, pending: Arc<CancellationQueue>) -> Self {
        Self { backend, pending }
    }

    /// A resolver on the system `getaddrinfo`.
    pub fn system(pending: Arc<CancellationQueue>) -> Self {
        Self::new(Arc::new(GaiResolver::new()), pending)
    }

    /// The cancellation queue this resolver defers to.
    pub fn cancellation_queue(&self) -> &Arc<CancellationQueue> {
        &self.pending
    }

    /// Resolves `name`:`service`, spending at most `budget`.
    ///
    /// `budget` is raised to [`MIN_RESOLVE_BUDGET`] first and is decremented
    /// by the time actually spent, so on return it holds what is left.
    ///
    /// Running out of budget yields [`ResolverError::Again`].
    pub async fn resolve(
        &self,
        name: &Name,
        service: &str,
        hints: &Hints,
        budget: &mut Duration,
    ) -> Result<ResolvedList, ResolverError> {
        if *budget < MIN_RESOLVE_BUDGET {
            *budget = MIN_RESOLVE_BUDGET;
        }
        let mut started = Instant::now();

        self.pending.drain();

        let request = LookupRequest::new(name.clone(), service, *hints);
        let mut lookup = self.backend.submit(request)?;

        loop {
            let status = lookup.suspend(*budget).await;
            let now = Instant::now();
            *budget = budget.saturating_sub(now - started);
            started = now;

            match status {
                Suspend::Ready(Ok(list)) => {
                    tracing::debug!(domain = %name, count = list.len(), remaining = ?budget, "resolved");
                    self.release(lookup);
                    return Ok(list);
                }
                Suspend::Ready(Err(e)) => {
                    tracing::debug!(domain = %name, error = %e, "resolution failed");
                    self.release(lookup);
                    return Err(e);
                }
                Suspend::TimedOut => {
                    tracing::debug!(domain = %name, "resolution budget exhausted");
                    self.release(lookup);
                    return Err(ResolverError::Again);
                }
                Suspend::Interrupted if budget.is_zero() => {
                    tracing::debug!(domain = %name, "resolution budget exhausted");
                    self.release(lookup);
                    return Err(ResolverError::Again);
                }
                Suspend::Interrupted => continue,
            }
        }
    }

    /// Cancels a lookup we are done with, deferring it when the backend
    /// refuses.
    fn release(&self, mut lookup: Box<dyn PendingLookup>) {
        match lookup.cancel() {
            CancelOutcome::NotCanceled => self.pending.defer(lookup),
            CancelOutcome::Canceled | CancelOutcome::AllDone => drop(lookup),
        }
    }
}

impl std::fmt::Debug for BoundedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedResolver")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
