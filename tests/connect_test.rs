//! Connect-By-Name Tests
//!
//! Covers:
//! - `ConnectJob::connect_by_name` through `DnsResolverWithOverrides`
//! - Resolver failure masking and timeout reporting
//! - Listener setup and peer formatting around a raced connection

mod common;

use racenet::base::neterror::NetError;
use racenet::dns::{
    BoundedResolver, CancelOutcome, CancellationQueue, CompletedLookup, DnsResolverWithOverrides,
    LookupRequest, PendingLookup, Resolve, ResolvedList, ResolverError, Suspend, Suspending,
};
use racenet::socket::listen::listen_by_service;
use racenet::socket::peer::peer_name_text;
use racenet::socket::{ConnectJob, ConnectOptions};

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

/// Fallback for names without an override.
struct Unknown;

impl Resolve for Unknown {
    fn submit(&self, _request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        Ok(Box::new(CompletedLookup::new(Err(ResolverError::NoName))))
    }
}

struct Slow;

impl PendingLookup for Slow {
    fn suspend(&mut self, bound: Duration) -> Suspending<'_> {
        Box::pin(async move {
            tokio::time::sleep(bound).await;
            Suspend::TimedOut
        })
    }

    fn cancel(&mut self) -> CancelOutcome {
        CancelOutcome::Canceled
    }
}

impl Resolve for Slow {
    fn submit(&self, _request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        Ok(Box::new(Slow))
    }
}

/// Answers with `addr` once `delay` has passed since submission.
struct Late {
    addr: SocketAddr,
    delay: Duration,
}

struct LateLookup {
    ready_at: tokio::time::Instant,
    list: Option<ResolvedList>,
}

impl PendingLookup for LateLookup {
    fn suspend(&mut self, bound: Duration) -> Suspending<'_> {
        Box::pin(async move {
            let wake = tokio::time::Instant::now() + bound;
            if wake < self.ready_at {
                tokio::time::sleep_until(wake).await;
                return Suspend::TimedOut;
            }
            tokio::time::sleep_until(self.ready_at).await;
            match self.list.take() {
                Some(list) => Suspend::Ready(Ok(list)),
                None => Suspend::Interrupted,
            }
        })
    }

    fn cancel(&mut self) -> CancelOutcome {
        CancelOutcome::Canceled
    }
}

impl Resolve for Late {
    fn submit(&self, _request: LookupRequest) -> Result<Box<dyn PendingLookup>, ResolverError> {
        Ok(Box::new(LateLookup {
            ready_at: tokio::time::Instant::now() + self.delay,
            list: Some(vec![self.addr].into_iter().collect()),
        }))
    }
}

fn job_with(overrides: Vec<(&'static str, Vec<IpAddr>)>) -> ConnectJob {
    let overrides: HashMap<Cow<'static, str>, Vec<IpAddr>> = overrides
        .into_iter()
        .map(|(name, ips)| (Cow::Borrowed(name), ips))
        .collect();
    let resolver = DnsResolverWithOverrides::new(Arc::new(Unknown), overrides);
    ConnectJob::new(BoundedResolver::new(
        Arc::new(resolver),
        Arc::new(CancellationQueue::new()),
    ))
}

#[tokio::test]
async fn test_connect_by_name_via_override() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let job = job_with(vec![("api.racenet.test", vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])]);
    let mut options = ConnectOptions::new().report_picked(true);

    let stream = job
        .connect_by_name(
            "api.racenet.test",
            &addr.port().to_string(),
            Duration::from_secs(2),
            &mut options,
        )
        .await
        .unwrap();

    assert_eq!(stream.peer_addr().unwrap(), addr);
    assert_eq!(options.picked.unwrap().socket_addr(), addr);
    assert_eq!(options.candidate_count, 1);
    assert!(options.resolver_error.is_none());
}

#[tokio::test]
async fn test_falls_through_to_working_family() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // Nothing listens on [::1] at this port, if IPv6 is there at all.
    let job = job_with(vec![(
        "dual.racenet.test",
        vec![IpAddr::V6(Ipv6Addr::LOCALHOST), IpAddr::V4(Ipv4Addr::LOCALHOST)],
    )]);
    let mut options = ConnectOptions::new().report_picked(true).report_details(true);

    let stream = job
        .connect_by_name(
            "dual.racenet.test",
            &addr.port().to_string(),
            Duration::from_secs(2),
            &mut options,
        )
        .await
        .unwrap();

    assert_eq!(stream.peer_addr().unwrap(), addr);
    assert_eq!(options.picked.unwrap().socket_addr(), addr);

    let details = options.details.unwrap();
    assert_eq!(details.results.len(), 2);
    assert!(details.results[0].os_error.is_some());
    assert_eq!(details.results[1].os_error, None);
    let attempted = details.address_of(&details.results[0]).unwrap();
    assert_eq!(attempted.socket_addr().ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
}

#[tokio::test]
async fn test_unknown_name_is_address_invalid() {
    let job = job_with(vec![]);
    let mut options = ConnectOptions::new().report_details(true);

    let err = job
        .connect_by_name("nowhere.racenet.test", "80", Duration::from_secs(1), &mut options)
        .await
        .unwrap_err();

    assert_eq!(err, NetError::AddressInvalid);
    assert_eq!(options.resolver_error, Some(ResolverError::NoName));
    assert!(options.details.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_resolution_timeout_reported_as_again() {
    let job = ConnectJob::new(BoundedResolver::new(
        Arc::new(Slow),
        Arc::new(CancellationQueue::new()),
    ));
    let mut options = ConnectOptions::new();

    let start = tokio::time::Instant::now();
    let err = job
        .connect_by_name("slow.racenet.test", "80", Duration::from_millis(20), &mut options)
        .await
        .unwrap_err();

    assert_eq!(err, NetError::AddressInvalid);
    assert_eq!(options.resolver_error, Some(ResolverError::Again));
    // The 20ms budget was raised to the 100ms connect floor.
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_millis(110));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_race_keeps_full_second_after_slow_resolution() {
    let stalled = common::stalled_listener();
    let job = ConnectJob::new(BoundedResolver::new(
        Arc::new(Late {
            addr: stalled.addr,
            delay: Duration::from_millis(180),
        }),
        Arc::new(CancellationQueue::new()),
    ));
    let mut options = ConnectOptions::new().report_details(true);

    let start = std::time::Instant::now();
    let err = job
        .connect_by_name(
            "late.racenet.test",
            &stalled.addr.port().to_string(),
            Duration::from_millis(200),
            &mut options,
        )
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(
        err,
        NetError::ConnectionTimedOut {
            os_error: libc::ETIMEDOUT
        }
    );
    assert!(options.resolver_error.is_none());
    // Resolution left ~20ms of the 200ms budget; the race still got 1s.
    assert!(elapsed >= Duration::from_millis(180) + Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2));
    let details = options.details.unwrap();
    assert_eq!(details.results.len(), 1);
    assert_eq!(details.results[0].os_error, Some(libc::ETIMEDOUT));
}

#[tokio::test]
async fn test_failed_race_still_hands_over_addresses() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let job = job_with(vec![("closed.racenet.test", vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])]);
    let mut options = ConnectOptions::new().report_details(true).report_picked(true);

    let err = job
        .connect_by_name(
            "closed.racenet.test",
            &closed.port().to_string(),
            Duration::from_secs(1),
            &mut options,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, NetError::CandidatesExhausted { .. }));
    assert!(options.picked.is_none());
    let details = options.details.unwrap();
    let addresses = details.addresses.unwrap();
    assert_eq!(addresses.first().unwrap().socket_addr(), closed);
}

#[tokio::test]
async fn test_listener_sees_v4_peer_as_ipv4() {
    let listener = match listen_by_service("0", libc::SOCK_STREAM, 8) {
        Ok(listener) => listener,
        Err(e) => {
            println!("dual-stack listener unavailable: {e}");
            return;
        }
    };
    let port = listener.local_addr().unwrap().as_socket().unwrap().port();
    let job = job_with(vec![("listen.racenet.test", vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])]);
    let mut options = ConnectOptions::new();

    let stream = match job
        .connect_by_name("listen.racenet.test", &port.to_string(), Duration::from_secs(2), &mut options)
        .await
    {
        Ok(stream) => stream,
        // IPv6-only listeners do not accept IPv4 peers.
        Err(e) => {
            println!("IPv4 connect to dual-stack listener failed: {e}");
            return;
        }
    };

    let (accepted, _) = listener.accept().unwrap();
    let (ip, peer_port) = peer_name_text(&accepted).unwrap();
    assert_eq!(ip, "127.0.0.1");
    assert_eq!(peer_port, stream.local_addr().unwrap().port());

    let (ip, port_seen) = peer_name_text(&stream).unwrap();
    assert_eq!(ip, "127.0.0.1");
    assert_eq!(port_seen, port);
}
