//! # racenet
//!
//! Deadline-bounded connect-by-name.
//!
//! `racenet` resolves a host and service under a hard time budget, then
//! races non-blocking connects to every resolved address with staggered
//! starts and returns the first stream to complete its handshake.
//!
//! ## Features
//!
//! - **Bounded Resolution**: lookups never outlive their budget; abandoned
//!   lookups are cancelled later instead of leaked
//! - **Connection Racing**: staggered parallel connects, first success wins,
//!   every loser closed
//! - **Candidate Control**: preferred, excluded and pinned address sets
//! - **Reporting**: picked address and per-candidate errors on request
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use racenet::dns::CancellationQueue;
//! use racenet::socket::{ConnectJob, ConnectOptions};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let job = ConnectJob::system(Arc::new(CancellationQueue::new()));
//!     let mut options = ConnectOptions::new().report_picked(true);
//!     let stream = job
//!         .connect_by_name("example.com", "443", Duration::from_secs(3), &mut options)
//!         .await
//!         .unwrap();
//!     println!("Connected to {:?}", options.picked);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core types and error definitions
//! - [`dns`] - Resolver backends, bounded resolution and deferred cancellation
//! - [`socket`] - Candidate ordering, the connection race and connect jobs

pub mod base;
pub mod dns;
pub mod socket;
