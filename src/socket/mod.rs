//! Socket and connection management.
//!
//! Provides the connection race mirroring Chromium's `net/socket/`
//! connect jobs:
//! - [`candidates`]: ordering resolved addresses for attempt
//! - [`race`]: staggered parallel connect with winner selection
//! - [`connectjob`]: bounded DNS -> raced TCP connection flow
//! - [`listen`] and [`peer`]: listener setup and peer formatting

pub mod attempt;
pub mod candidates;
pub mod connectjob;
pub mod listen;
pub mod options;
pub mod peer;
pub mod race;
pub mod readiness;

pub use candidates::{Candidate, CandidateSet};
pub use connectjob::ConnectJob;
pub use options::{CandidateResult, ConnectDetails, ConnectOptions};
pub use race::{race_connect, Launch, Racer, Wait};
