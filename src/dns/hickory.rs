//! Async DNS resolver using hickory-dns.
//!
//! This resolver provides fully async DNS resolution with support for:
//! - DNS-over-HTTPS (DoH)
//! - DNS-over-TLS (DoT)
//! - System DNS configuration auto-detection
//! - IPv4 + IPv6 lookup for connection racing
//!
//! Unlike `GaiResolver`, a lookup here is an ordinary tokio task, so
//! cancellation takes effect at the task's next yield point instead of
//! waiting for a blocking thread to return.

use super::address::{ResolvedAddress, ResolvedList};
use super::error::ResolverError;
use super::resolve::{CancelOutcome, LookupRequest, PendingLookup, Resolve, Suspend, Suspending};
use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use std::{net::SocketAddr, sync::LazyLock, time::Duration};
use tokio::task::JoinHandle;

/// Async DNS resolver backed by hickory-dns.
///
/// This resolver is lazily initialized on first use and shared across
/// all instances via a static `LazyLock`. It automatically configures
/// itself based on the system's DNS settings.
///
/// Services must be numeric ports; hickory does not consult the services
/// database.
///
/// # Example
///
/// ```rust,ignore
/// use racenet::dns::{BoundedResolver, CancellationQueue, HickoryResolver};
///
/// let resolver = BoundedResolver::new(
///     Arc::new(HickoryResolver::new()),
///     Arc::new(CancellationQueue::new()),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    resolver: &'static LazyLock<TokioResolver>,
}

impl HickoryResolver {
    /// Creates a new `HickoryResolver`.
    ///
    /// The underlying resolver is lazily initialized on first DNS query.
    /// It will attempt to read system DNS configuration; if that fails,
    /// it falls back to sensible defaults.
    pub fn new() -> Self {
        static RESOLVER: LazyLock<TokioResolver> = LazyLock::new(|| {
            let mut builder = match TokioResolver::builder_tokio() {
                Ok(builder) => {
                    tracing::debug!("Using system DNS configuration");
                    builder
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to read system DNS config, using defaults"
                    );
                    TokioResolver::builder_with_config(
                        ResolverConfig::default(),
                        TokioConnectionProvider::default(),
                    )
                }
            };

            // Both families, so every address can enter the race.
            builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

            builder.build()
        });

        Self {
            resolver: &RESOLVER,
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for HickoryResolver {
    fn submit(&self, request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        let port: u16 = request.service.parse().map_err(|_| ResolverError::Service)?;
        if request.hints.socket_type != 0 && request.hints.socket_type != libc::SOCK_STREAM {
            return Err(ResolverError::SocketType);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            tracing::error!(error = %e, "hickory lookup submitted outside a tokio runtime");
            ResolverError::System(libc::EINVAL)
        })?;

        let resolver = self.resolver;
        let family = request.hints.family;
        let handle = runtime.spawn(async move {
            let domain = request.name.as_str();
            tracing::debug!(domain = %domain, "resolving via hickory-dns");

            let lookup = resolver.lookup_ip(domain).await.map_err(|e| {
                tracing::debug!(domain = %domain, error = %e, "hickory-dns lookup failed");
                ResolverError::NoName
            })?;

            let addrs: Vec<ResolvedAddress> = lookup
                .iter()
                .filter(|ip| match family {
                    libc::AF_INET => ip.is_ipv4(),
                    libc::AF_INET6 => ip.is_ipv6(),
                    _ => true,
                })
                .map(|ip| ResolvedAddress::new(SocketAddr::new(ip, port)))
                .collect();

            if addrs.is_empty() {
                return Err(ResolverError::NoName);
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "hickory-dns resolution complete");
            Ok(ResolvedList::new(addrs))
        });

        Ok(Box::new(HickoryLookup {
            handle,
            taken: false,
        }))
    }
}

/// A hickory lookup running as a tokio task.
struct HickoryLookup {
    handle: JoinHandle<Result<ResolvedList, ResolverError>>,
    taken: bool,
}

impl PendingLookup for HickoryLookup {
    fn suspend(&mut self, bound: Duration) -> Suspending<'_> {
        Box::pin(async move {
            if self.taken {
                return Suspend::Ready(Err(ResolverError::Fail));
            }
            match tokio::time::timeout(bound, &mut self.handle).await {
                Ok(joined) => {
                    self.taken = true;
                    Suspend::Ready(joined.unwrap_or_else(|e| {
                        tracing::error!(error = %e, "hickory-dns task failed");
                        Err(ResolverError::System(libc::EIO))
                    }))
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
        // Abort is only observed once the task is next polled.
        if self.handle.is_finished() {
            CancelOutcome::Canceled
        } else {
            CancelOutcome::NotCanceled
        }
    }
}
