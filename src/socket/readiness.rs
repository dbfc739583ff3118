//! Reusable readiness set for in-flight connects.
//!
//! Wraps a `poll(2)` descriptor array that lives for the whole race. The
//! array is rebuilt on every wait but its allocation is kept, growing
//! geometrically as more attempts are in flight at once.

use crate::base::neterror::NetError;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

const READY_MASK: libc::c_short = libc::POLLOUT | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

#[derive(Debug, Default)]
pub struct ReadinessSet {
    fds: Vec<libc::pollfd>,
    /// Attempt index for each entry of `fds`.
    slots: Vec<usize>,
}

impl ReadinessSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the set, keeping its allocation.
    pub fn clear(&mut self) {
        self.fds.clear();
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Current allocation, in entries.
    pub fn capacity(&self) -> usize {
        self.fds.capacity()
    }

    /// Registers `fd`, belonging to attempt `slot`, for write readiness.
    pub fn insert(&mut self, fd: RawFd, slot: usize) -> Result<(), NetError> {
        if self.fds.len() == self.fds.capacity() {
            let grow = self.fds.capacity().max(4);
            self.fds
                .try_reserve(grow)
                .map_err(|_| NetError::OutOfMemory)?;
            self.slots
                .try_reserve(grow)
                .map_err(|_| NetError::OutOfMemory)?;
        }
        self.fds.push(libc::pollfd {
            fd,
            events: libc::POLLOUT,
            revents: 0,
        });
        self.slots.push(slot);
        Ok(())
    }

    /// Blocks until at least one registered socket is ready or `timeout`
    /// elapses. Returns the number of ready sockets.
    ///
    /// Interrupted waits are retried with the same bound. The timeout is
    /// rounded up to whole milliseconds so a short positive wait never
    /// turns into a busy poll.
    pub fn poll(&mut self, timeout: Duration) -> io::Result<usize> {
        let mut millis = timeout.as_millis();
        if timeout.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        let millis = libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX);

        loop {
            // SAFETY: `fds` is a valid, initialized array of `len` pollfds.
            let rc = unsafe {
                libc::poll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as libc::nfds_t,
                    millis,
                )
            };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
            tracing::trace!("readiness wait interrupted, retrying");
        }
    }

    /// Attempt indices whose sockets polled ready, in registration order.
    pub fn ready(&self) -> impl Iterator<Item = usize> + '_ {
        self.fds
            .iter()
            .zip(&self.slots)
            .filter(|(pfd, _)| pfd.revents & READY_MASK != 0)
            .map(|(_, slot)| *slot)
    }

    /// Frees the scratch allocation.
    pub fn release(&mut self) {
        self.fds = Vec::new();
        self.slots = Vec::new();
    }
}
