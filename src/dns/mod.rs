//! DNS Resolution Module
//!
//! Provides pluggable, deadline-bounded name resolution:
//! - System resolver (getaddrinfo via thread pool)
//! - Async hickory-dns resolver (DoH/DoT capable)
//! - Hostname-to-IP override mechanism
//!
//! # Architecture
//!
//! Backends implement [`Resolve`] and hand back a [`PendingLookup`] that can
//! be waited on with a bound and cancelled without blocking.
//! [`BoundedResolver`] drives one lookup within a budget; lookups it abandons
//! while still running are parked in a shared [`CancellationQueue`] until
//! they can be released.
//!
//! # Example
//!
//! ```rust,ignore
//! use racenet::dns::{BoundedResolver, CancellationQueue, Hints, Name};
//!
//! let resolver = BoundedResolver::system(Arc::new(CancellationQueue::new()));
//! let mut budget = Duration::from_secs(2);
//! let list = resolver
//!     .resolve(&Name::new("example.com"), "443", &Hints::stream(), &mut budget)
//!     .await?;
//! for addr in &list {
//!     println!("Resolved: {}", addr);
//! }
//! ```

mod address;
mod bounded;
mod cancel;
mod error;
mod gai;
mod hickory;
mod resolve;

pub use address::{Hints, ResolvedAddress, ResolvedList};
pub(crate) use address::ip_text;
pub use bounded::{BoundedResolver, MIN_RESOLVE_BUDGET};
pub use cancel::CancellationQueue;
pub use error::ResolverError;
pub use gai::GaiResolver;
pub(crate) use gai::getaddrinfo;
pub use hickory::HickoryResolver;
pub use resolve::{
    CancelOutcome, CompletedLookup, DnsResolverWithOverrides, LookupRequest, Name, PendingLookup,
    Resolve, Suspend, Suspending,
};
