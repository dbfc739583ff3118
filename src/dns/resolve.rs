//! Core DNS resolution types and traits.
//!
//! A resolver backend does not return addresses directly. It accepts a
//! [`LookupRequest`] and hands back a [`PendingLookup`]: a handle to work
//! running in the background that can be waited on with a time bound and
//! that must be cancelled before it is released. The bounded resolver is
//! built entirely on those two operations.

use super::address::{Hints, ResolvedList};
use super::error::ResolverError;
use futures::future::{BoxFuture, FutureExt};
use std::{borrow::Cow, collections::HashMap, fmt, sync::Arc, time::Duration};

/// A domain name to resolve into IP addresses.
///
/// This is a lightweight wrapper around a hostname string that provides
/// a type-safe way to pass domain names to resolvers.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// View the hostname as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Everything a backend needs to run one lookup. Owned, so the request can
/// outlive the caller that submitted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupRequest {
    pub name: Name,
    pub service: Box<str>,
    pub hints: Hints,
}

impl LookupRequest {
    pub fn new(name: Name, service: impl Into<Box<str>>, hints: Hints) -> Self {
        Self {
            name,
            service: service.into(),
            hints,
        }
    }
}

/// Outcome of waiting on a pending lookup.
#[derive(Debug)]
pub enum Suspend {
    /// The lookup finished. Ownership of the list passes to the waiter.
    Ready(Result<ResolvedList, ResolverError>),
    /// The wait bound elapsed first.
    TimedOut,
    /// Woken without completion or timeout; wait again.
    Interrupted,
}

/// Outcome of a cancellation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The background work was stopped before it finished.
    Canceled,
    /// The background work had already finished.
    AllDone,
    /// The background work is still running and could not be stopped.
    /// The handle must be kept and cancellation retried later.
    NotCanceled,
}

impl CancelOutcome {
    /// True when the handle can now be released.
    pub fn is_released(self) -> bool {
        !matches!(self, CancelOutcome::NotCanceled)
    }
}

/// Alias for the `Future` type returned by [`PendingLookup::suspend`].
pub type Suspending<'a> = BoxFuture<'a, Suspend>;

/// A lookup running in the background.
///
/// Dropping the handle releases it, including any result it still holds.
pub trait PendingLookup: Send {
    /// Waits until the lookup completes or `bound` elapses.
    fn suspend(&mut self, bound: Duration) -> Suspending<'_>;

    /// Tries to stop the lookup. Never blocks.
    fn cancel(&mut self) -> CancelOutcome;
}

/// Trait for DNS resolution backends.
///
/// This is the core abstraction for resolvers in racenet. Implementations
/// must be thread-safe; `submit` must not block.
pub trait Resolve: Send + Sync {
    /// Starts a lookup in the background.
    fn submit(&self, request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError>;
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn submit(&self, request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        (**self).submit(request)
    }
}

/// A lookup whose answer was known at submission time.
#[derive(Debug)]
pub struct CompletedLookup {
    result: Option<Result<ResolvedList, ResolverError>>,
}

impl CompletedLookup {
    pub fn new(result: Result<ResolvedList, ResolverError>) -> Self {
        Self {
            result: Some(result),
        }
    }
}

impl PendingLookup for CompletedLookup {
    fn suspend(&mut self, _bound: Duration) -> Suspending<'_> {
        let status = match self.result.take() {
            Some(result) => Suspend::Ready(result),
            None => Suspend::Ready(Err(ResolverError::Fail)),
        };
        futures::future::ready(status).boxed()
    }

    fn cancel(&mut self) -> CancelOutcome {
        CancelOutcome::AllDone
    }
}

/// DNS resolver wrapper that supports hostname overrides.
///
/// Names found in the override map are answered immediately with a
/// [`CompletedLookup`]; the service port is applied to every override entry.
/// Everything else goes to the underlying resolver. Useful for:
/// - Testing without real DNS
/// - Forcing specific IPs for certain domains
///
/// # Example
///
/// ```rust,ignore
/// use racenet::dns::{DnsResolverWithOverrides, GaiResolver};
/// use std::collections::HashMap;
///
/// let mut overrides = HashMap::new();
/// overrides.insert("api.local".into(), vec!["127.0.0.1".parse().unwrap()]);
///
/// let resolver = DnsResolverWithOverrides::new(Arc::new(GaiResolver::new()), overrides);
/// ```
pub struct DnsResolverWithOverrides {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<Cow<'static, str>, Vec<std::net::IpAddr>>>,
}

impl DnsResolverWithOverrides {
    /// Creates a new resolver with the given overrides.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fallback resolver for non-overridden hostnames.
    /// * `overrides` - Map of hostnames to their addresses.
    pub fn new(
        inner: Arc<dyn Resolve>,
        overrides: HashMap<Cow<'static, str>, Vec<std::net::IpAddr>>,
    ) -> Self {
        Self {
            inner,
            overrides: Arc::new(overrides),
        }
    }

    /// Returns the number of configured overrides.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for DnsResolverWithOverrides {
    fn submit(&self, request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        let Some(ips) = self.overrides.get(request.name.as_str()) else {
            return self.inner.submit(request);
        };
        let port = match request.service.parse::<u16>() {
            Ok(port) => port,
            Err(_) => return Ok(Box::new(CompletedLookup::new(Err(ResolverError::Service)))),
        };
        let family = request.hints.family;
        let list: ResolvedList = ips
            .iter()
            .filter(|ip| match family {
                libc::AF_INET => ip.is_ipv4(),
                libc::AF_INET6 => ip.is_ipv6(),
                _ => true,
            })
            .map(|ip| std::net::SocketAddr::new(*ip, port))
            .collect();
        tracing::debug!(domain = %request.name, count = list.len(), "answered from overrides");
        let result = if list.is_empty() {
            Err(ResolverError::NoName)
        } else {
            Ok(list)
        };
        Ok(Box::new(CompletedLookup::new(result)))
    }
}

impl fmt::Debug for DnsResolverWithOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolverWithOverrides")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    #[test]
    fn test_name_from_str() {
        let name = Name::from("example.com");
        assert_eq!(name.as_str(), "example.com");
        assert_eq!(name.to_string(), "example.com");
    }

    #[test]
    fn test_name_equality() {
        let name1 = Name::new("example.com");
        let name2 = Name::new("example.com");
        let name3 = Name::new("other.com");

        assert_eq!(name1, name2);
        assert_ne!(name1, name3);
    }

    struct MockResolver {
        response: Vec<SocketAddr>,
    }

    impl Resolve for MockResolver {
        fn submit(&self, _request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
            let list: ResolvedList = self.response.iter().copied().collect();
            Ok(Box::new(CompletedLookup::new(Ok(list))))
        }
    }

    async fn lookup(resolver: &dyn Resolve, name: &str, service: &str) -> Suspend {
        let mut pending = resolver
            .submit(LookupRequest::new(Name::new(name), service, Hints::stream()))
            .unwrap();
        let status = pending.suspend(Duration::from_millis(50)).await;
        status
    }

    #[tokio::test]
    async fn test_override_resolver_hit() {
        let mock = Arc::new(MockResolver {
            response: vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53)],
        });

        let mut overrides = HashMap::new();
        overrides.insert(
            Cow::Borrowed("override.local"),
            vec![IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))],
        );

        let resolver = DnsResolverWithOverrides::new(mock, overrides);
        let Suspend::Ready(Ok(list)) = lookup(&resolver, "override.local", "8080").await else {
            panic!("expected override answer");
        };

        assert_eq!(list.len(), 1);
        assert_eq!(list.as_slice()[0].socket_addr(), "127.0.0.1:8080".parse().unwrap());
    }

    #[tokio::test]
    async fn test_override_resolver_miss() {
        let mock = Arc::new(MockResolver {
            response: vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53)],
        });

        let resolver = DnsResolverWithOverrides::new(mock, HashMap::new());
        let Suspend::Ready(Ok(list)) = lookup(&resolver, "not-overridden.com", "53").await else {
            panic!("expected passthrough answer");
        };

        assert_eq!(list.len(), 1);
        assert_eq!(list.as_slice()[0].socket_addr().ip(), IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[tokio::test]
    async fn test_override_resolver_non_numeric_service() {
        let mock = Arc::new(MockResolver { response: vec![] });
        let mut overrides = HashMap::new();
        overrides.insert(Cow::Borrowed("svc.local"), vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);

        let resolver = DnsResolverWithOverrides::new(mock, overrides);
        assert!(matches!(
            lookup(&resolver, "svc.local", "http").await,
            Suspend::Ready(Err(ResolverError::Service))
        ));
    }

    #[tokio::test]
    async fn test_completed_lookup_is_all_done() {
        let mut done = CompletedLookup::new(Err(ResolverError::NoName));
        assert!(matches!(
            done.suspend(Duration::ZERO).await,
            Suspend::Ready(Err(ResolverError::NoName))
        ));
        assert_eq!(done.cancel(), CancelOutcome::AllDone);
        assert!(done.cancel().is_released());
    }
}
