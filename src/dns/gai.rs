//! System DNS resolver using getaddrinfo.
//!
//! This resolver uses the operating system's native resolution via
//! `getaddrinfo`, executed on tokio's blocking pool.
//!
//! # Cancellation
//!
//! A lookup that has already started on a blocking thread cannot be
//! interrupted. Until that thread returns, [`PendingLookup::cancel`] reports
//! [`CancelOutcome::NotCanceled`] and the bounded resolver parks the handle
//! in its cancellation queue.

use super::address::{socket_addr_from_raw, Hints, ResolvedAddress, ResolvedList};
use super::error::ResolverError;
use super::resolve::{CancelOutcome, LookupRequest, PendingLookup, Resolve, Suspend, Suspending};
use std::ffi::{CStr, CString};
use std::ptr;
use std::time::Duration;
use tokio::task::JoinHandle;

/// System DNS resolver using `getaddrinfo` in a thread pool.
///
/// Requires a tokio runtime at submission time.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    /// Creates a new `GaiResolver`.
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn submit(&self, request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            tracing::error!(error = %e, "getaddrinfo submitted outside a tokio runtime");
            ResolverError::System(libc::EINVAL)
        })?;
        let domain = request.name.to_string();
        let handle = runtime.spawn_blocking(move || {
            tracing::debug!(host = %request.name, service = %request.service, "resolving via getaddrinfo");
            getaddrinfo(Some(request.name.as_str()), &request.service, &request.hints)
        });
        Ok(Box::new(GaiLookup {
            domain,
            handle,
            taken: false,
        }))
    }
}

/// A `getaddrinfo` call running on the blocking pool.
struct GaiLookup {
    domain: String,
    handle: JoinHandle<Result<ResolvedList, ResolverError>>,
    /// The join handle has yielded its output and must not be polled again.
    taken: bool,
}

impl PendingLookup for GaiLookup {
    fn suspend(&mut self, bound: Duration) -> Suspending<'_> {
        Box::pin(async move {
            if self.taken {
                return Suspend::Ready(Err(ResolverError::Fail));
            }
            match tokio::time::timeout(bound, &mut self.handle).await {
                Ok(Ok(result)) => {
                    self.taken = true;
                    Suspend::Ready(result)
                }
                Ok(Err(e)) => {
                    self.taken = true;
                    tracing::error!(domain = %self.domain, error = %e, "getaddrinfo task failed");
                    Suspend::Ready(Err(ResolverError::System(libc::EIO)))
                }
                Err(_) => Suspend::TimedOut,
            }
        })
    }

    fn cancel(&mut self) -> CancelOutcome {
        if self.handle.is_finished() {
            return CancelOutcome::AllDone;
        }
        self.handle.abort();
        if self.handle.is_finished() {
            CancelOutcome::Canceled
        } else {
            CancelOutcome::NotCanceled
        }
    }
}

/// Frees an `addrinfo` chain on drop.
struct AddrInfoChain(*mut libc::addrinfo);

impl Drop for AddrInfoChain {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from a successful getaddrinfo call and
            // is freed exactly once.
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

/// Blocking `getaddrinfo`, copied into an owned [`ResolvedList`].
///
/// Entries with non-IP families are skipped.
pub(crate) fn getaddrinfo(
    node: Option<&str>,
    service: &str,
    hints: &Hints,
) -> Result<ResolvedList, ResolverError> {
    let node = node
        .map(CString::new)
        .transpose()
        .map_err(|_| ResolverError::NoName)?;
    let service = CString::new(service).map_err(|_| ResolverError::Service)?;

    // SAFETY: addrinfo is a plain C struct; all-zero is a valid hints value.
    let mut raw_hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    raw_hints.ai_family = hints.family;
    raw_hints.ai_socktype = hints.socket_type;
    raw_hints.ai_protocol = hints.protocol;
    raw_hints.ai_flags = hints.flags;

    let mut res: *mut libc::addrinfo = ptr::null_mut();
    // SAFETY: all pointers are valid for the duration of the call.
    let rc = unsafe {
        libc::getaddrinfo(
            node.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
            service.as_ptr(),
            &raw_hints,
            &mut res,
        )
    };
    if rc != 0 {
        return Err(ResolverError::from_code(rc));
    }
    let chain = AddrInfoChain(res);

    let mut addresses = Vec::new();
    let mut cursor = chain.0;
    while !cursor.is_null() {
        // SAFETY: cursor walks the chain owned by `chain`.
        let entry = unsafe { &*cursor };
        if let Some(addr) = unsafe { socket_addr_from_raw(entry.ai_addr, entry.ai_addrlen) } {
            let canonical_name = if entry.ai_canonname.is_null() {
                None
            } else {
                // SAFETY: non-null canonical names are NUL-terminated.
                Some(unsafe { CStr::from_ptr(entry.ai_canonname) }.to_string_lossy().into_owned())
            };
            addresses.push(ResolvedAddress::from_parts(
                entry.ai_family,
                entry.ai_socktype,
                entry.ai_protocol,
                addr,
                canonical_name,
            ));
        }
        cursor = entry.ai_next;
    }

    if addresses.is_empty() {
        return Err(ResolverError::NoName);
    }
    Ok(ResolvedList::new(addresses))
}
