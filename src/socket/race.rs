//! Staggered parallel connect over a candidate set.
//!
//! A [`Racer`] launches one non-blocking connect at a time and waits on
//! every attempt in flight between launches. The first attempt to complete
//! its handshake wins; every other socket is closed before the race
//! returns. The race runs on the calling thread and never waits past its
//! deadline except inside a single `poll(2)` call bounded by it.
//!
//! Launches are staggered by `first_wait` (after the first attempt) and
//! `next_wait` (after later ones). A failure wakes the race early so the
//! next candidate starts without waiting out the stagger.

use crate::base::neterror::NetError;
use crate::dns::ResolvedList;
use crate::socket::attempt::{AttemptSlot, AttemptState, Started};
use crate::socket::candidates::CandidateSet;
use crate::socket::options::{CandidateResult, ConnectDetails, ConnectOptions};
use crate::socket::readiness::ReadinessSet;
use socket2::Socket;
use std::net::TcpStream;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

/// Race budgets below this are raised to it.
pub const MIN_RACE_TIMEOUT: Duration = Duration::from_millis(100);
/// Lower bound of the first stagger interval.
pub const MIN_STAGGER: Duration = Duration::from_millis(100);
/// Upper bound of the first stagger interval.
pub const MAX_STAGGER: Duration = Duration::from_millis(1000);

/// Result of [`Racer::launch_next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Launch {
    /// The attempt at this index connected synchronously.
    Connected(usize),
    /// An attempt is now in flight.
    Started,
    /// Every candidate has been launched.
    NoMoreCandidates,
}

/// Result of [`Racer::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// The attempt at this index connected.
    Connected(usize),
    /// Time to launch the next candidate, if any.
    Advance,
    /// Nothing in flight and nothing left to launch.
    Exhausted,
    /// Readiness multiplexing failed.
    Fatal,
}

/// Stagger intervals for a race of `timeout` over a resolved list of
/// `raw_len` entries: the budget split evenly, clamped to
/// [`MIN_STAGGER`, `MAX_STAGGER`], and half of that for later launches.
pub fn stagger_intervals(timeout: Duration, raw_len: usize) -> (Duration, Duration) {
    let divisor = u32::try_from(raw_len.max(1)).unwrap_or(u32::MAX);
    let first = (timeout / divisor).clamp(MIN_STAGGER, MAX_STAGGER);
    (first, first / 2)
}

/// State of one race. Confined to the thread that runs it.
#[derive(Debug)]
pub struct Racer<'a> {
    slots: Vec<AttemptSlot<'a>>,
    /// Index of the next candidate to launch.
    next: usize,
    top_fd: RawFd,
    deadline: Instant,
    first_wait: Duration,
    next_wait: Duration,
    readiness: ReadinessSet,
}

impl<'a> Racer<'a> {
    /// Prepares a race over `candidates` that must end within `timeout`.
    ///
    /// The deadline is fixed here. `timeout` is used as given; callers
    /// apply [`MIN_RACE_TIMEOUT`].
    pub fn new(candidates: &CandidateSet<'a>, timeout: Duration) -> Result<Self, NetError> {
        if candidates.is_empty() {
            return Err(NetError::NoCandidates);
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(candidates.len())
            .map_err(|_| NetError::OutOfMemory)?;
        slots.extend(candidates.iter().copied().map(AttemptSlot::new));

        let (first_wait, next_wait) = stagger_intervals(timeout, candidates.raw_len());
        tracing::trace!(
            candidates = slots.len(),
            ?timeout,
            ?first_wait,
            ?next_wait,
            "starting connection race"
        );

        Ok(Self {
            slots,
            next: 0,
            top_fd: -1,
            deadline: Instant::now() + timeout,
            first_wait,
            next_wait,
            readiness: ReadinessSet::new(),
        })
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn first_wait(&self) -> Duration {
        self.first_wait
    }

    pub fn next_wait(&self) -> Duration {
        self.next_wait
    }

    /// Highest descriptor opened so far, or -1.
    pub fn top_fd(&self) -> RawFd {
        self.top_fd
    }

    pub fn slots(&self) -> &[AttemptSlot<'a>] {
        &self.slots
    }

    /// Number of attempts launched (including those that failed to start).
    pub fn launched(&self) -> usize {
        self.next
    }

    /// Number of sockets the race currently holds open.
    pub fn open_sockets(&self) -> usize {
        self.slots.iter().filter(|s| s.socket.is_some()).count()
    }

    /// Starts the next candidate's connect.
    ///
    /// Candidates whose socket cannot be created, or whose connect fails
    /// immediately, are recorded as failed and skipped.
    pub fn launch_next(&mut self) -> Launch {
        while self.next < self.slots.len() {
            let index = self.next;
            self.next += 1;

            let slot = &mut self.slots[index];
            let launched = slot.launch();
            if let Some(fd) = slot.raw_fd() {
                self.top_fd = self.top_fd.max(fd);
            }
            match launched {
                Ok(Started::Connected) => {
                    tracing::debug!(index, address = %slot.candidate.address, "connected immediately");
                    return Launch::Connected(index);
                }
                Ok(Started::InProgress) => {
                    tracing::trace!(index, address = %slot.candidate.address, "connect started");
                    return Launch::Started;
                }
                Err(code) => {
                    tracing::debug!(index, address = %slot.candidate.address, error = code, "connect failed to start");
                }
            }
        }
        Launch::NoMoreCandidates
    }

    /// Waits for an in-flight attempt to finish, or until the next launch
    /// is due.
    pub fn wait(&mut self) -> Wait {
        let start = Instant::now();
        let remaining = self.deadline.saturating_duration_since(start);
        let bound = if self.next >= self.slots.len() {
            remaining
        } else if self.next > 1 {
            self.first_wait.min(self.next_wait)
        } else {
            self.first_wait
        };
        let until = start + bound.min(remaining);

        loop {
            self.readiness.clear();
            for (index, slot) in self.slots[..self.next].iter().enumerate() {
                if slot.state != AttemptState::InFlight {
                    continue;
                }
                if let Some(fd) = slot.raw_fd() {
                    if self.readiness.insert(fd, index).is_err() {
                        tracing::warn!(top_fd = self.top_fd, "readiness set allocation failed");
                        return Wait::Fatal;
                    }
                }
            }
            if self.readiness.is_empty() {
                return if self.next < self.slots.len() {
                    Wait::Advance
                } else {
                    Wait::Exhausted
                };
            }

            let left = until.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Wait::Advance;
            }

            match self.readiness.poll(left) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "readiness wait failed");
                    return Wait::Fatal;
                }
            }

            let mut failed = false;
            for index in self.readiness.ready() {
                let slot = &mut self.slots[index];
                if slot.settle() {
                    tracing::debug!(index, address = %slot.candidate.address, "connected");
                    return Wait::Connected(index);
                }
                tracing::debug!(index, address = %slot.candidate.address, error = ?slot.error, "connect failed");
                failed = true;
            }
            if failed {
                return Wait::Advance;
            }
        }
    }

    /// Ends the race. Closes every socket except the winner's, records
    /// `fallback_error` on slots without an error (0 records nothing), and
    /// frees the readiness buffer. Returns the winner's socket.
    pub fn finish(&mut self, winner: Option<usize>, fallback_error: i32) -> Option<Socket> {
        let mut won = None;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if Some(index) == winner {
                won = slot.socket.take();
                slot.state = AttemptState::Connected;
                continue;
            }
            slot.abandon();
            if slot.error.is_none() && fallback_error != 0 {
                slot.error = Some(fallback_error);
            }
        }
        self.readiness.release();
        won
    }

    /// Ends the race with `index` as the winner and takes its socket.
    fn claim(&mut self, index: usize) -> Result<(usize, Socket), NetError> {
        match self.finish(Some(index), 0) {
            Some(socket) => Ok((index, socket)),
            None => {
                tracing::error!(index, "winning attempt holds no socket");
                Err(NetError::RaceAborted)
            }
        }
    }

    /// Numerically largest error recorded on any slot.
    pub fn worst_error(&self) -> Option<i32> {
        self.slots.iter().filter_map(|s| s.error).filter(|&e| e > 0).max()
    }

    /// Per-candidate outcome, in attempt order.
    pub fn results(&self) -> Vec<CandidateResult> {
        self.slots
            .iter()
            .map(|slot| CandidateResult {
                index: slot.candidate.raw_index,
                os_error: slot.error,
            })
            .collect()
    }

    /// Drives the race to completion: launch, wait, repeat until a winner,
    /// exhaustion, a fatal error, or the deadline.
    ///
    /// On failure the error carries the largest recorded errno, defaulting
    /// to `EBADF` when every candidate was tried and `ETIMEDOUT` when the
    /// deadline passed.
    pub fn run(&mut self) -> Result<(usize, Socket), NetError> {
        while Instant::now() < self.deadline {
            let outcome = match self.launch_next() {
                Launch::Connected(index) => Wait::Connected(index),
                Launch::Started | Launch::NoMoreCandidates => self.wait(),
            };
            match outcome {
                Wait::Connected(index) => return self.claim(index),
                Wait::Advance => {}
                Wait::Exhausted => {
                    self.finish(None, 0);
                    let os_error = self.worst_error().unwrap_or(libc::EBADF);
                    tracing::debug!(os_error, "all candidates failed");
                    return Err(NetError::CandidatesExhausted { os_error });
                }
                Wait::Fatal => {
                    self.finish(None, libc::ENOMEM);
                    return Err(NetError::OutOfMemory);
                }
            }
        }

        self.finish(None, libc::ETIMEDOUT);
        let os_error = self.worst_error().unwrap_or(libc::ETIMEDOUT);
        tracing::debug!(os_error, launched = self.next, "connection race timed out");
        Err(NetError::ConnectionTimedOut { os_error })
    }
}

/// Races connects to the addresses in `addresses` and returns the first
/// stream to connect.
///
/// `timeout` is raised to [`MIN_RACE_TIMEOUT`]. Candidates are chosen and
/// ordered from `options`; its output fields are cleared, then filled as
/// requested. The stream is returned in non-blocking mode.
pub fn race_connect(
    addresses: &ResolvedList,
    timeout: Duration,
    options: &mut ConnectOptions,
) -> Result<TcpStream, NetError> {
    let timeout = timeout.max(MIN_RACE_TIMEOUT);
    options.picked = None;
    options.details = None;
    options.candidate_count = 0;

    let candidates = CandidateSet::build(
        addresses.as_slice(),
        &options.preferred,
        &options.excluded,
        options.pin_to_preferred,
    )?;
    options.candidate_count = candidates.len();

    let mut racer = Racer::new(&candidates, timeout)?;
    let outcome = racer.run();

    if options.report_details {
        options.details = Some(ConnectDetails {
            results: racer.results(),
            addresses: None,
        });
    }

    let (index, socket) = outcome?;
    if options.report_picked {
        options.picked = Some(candidates[index].address.clone());
    }
    Ok(TcpStream::from(socket))
}
