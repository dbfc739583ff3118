//! Per-candidate connection attempt state.

use crate::base::context::OsErrorExt;
use crate::socket::candidates::Candidate;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::Read;
use std::os::fd::{AsRawFd, RawFd};

/// Lifecycle of one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptState {
    /// Not launched yet.
    Idle,
    /// Socket creation and `connect` in progress.
    Launching,
    /// `connect` returned in progress; waiting for readiness.
    InFlight,
    Connected,
    Failed,
}

/// Result of starting a non-blocking connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Started {
    /// The handshake completed synchronously.
    Connected,
    InProgress,
}

/// Mutable state for one candidate during a race.
#[derive(Debug)]
pub struct AttemptSlot<'a> {
    pub(crate) candidate: Candidate<'a>,
    pub(crate) socket: Option<Socket>,
    pub(crate) error: Option<i32>,
    pub(crate) state: AttemptState,
}

impl<'a> AttemptSlot<'a> {
    pub(crate) fn new(candidate: Candidate<'a>) -> Self {
        Self {
            candidate,
            socket: None,
            error: None,
            state: AttemptState::Idle,
        }
    }

    pub fn candidate(&self) -> &Candidate<'a> {
        &self.candidate
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Error recorded for this attempt, if any.
    pub fn error(&self) -> Option<i32> {
        self.error
    }

    pub(crate) fn raw_fd(&self) -> Option<RawFd> {
        self.socket.as_ref().map(|s| s.as_raw_fd())
    }

    /// Opens a non-blocking socket for the candidate and starts `connect`.
    ///
    /// The family, socket type and protocol go to `socket(2)` exactly as
    /// resolved. On failure the socket is closed, the error recorded, and
    /// the slot marked failed.
    pub(crate) fn launch(&mut self) -> Result<Started, i32> {
        self.state = AttemptState::Launching;
        let address = self.candidate.address;

        let socket = match Socket::new(
            Domain::from(address.family()),
            Type::from(address.socket_type()),
            Some(Protocol::from(address.protocol())),
        ) {
            Ok(socket) => socket,
            Err(e) => return Err(self.fail(e.os_error_code())),
        };
        if let Err(e) = socket.set_nonblocking(true) {
            return Err(self.fail(e.os_error_code()));
        }

        match socket.connect(&SockAddr::from(address.socket_addr())) {
            Ok(()) => {
                self.socket = Some(socket);
                self.state = AttemptState::Connected;
                Ok(Started::Connected)
            }
            Err(e)
                if e.raw_os_error() == Some(libc::EINPROGRESS)
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                self.socket = Some(socket);
                self.state = AttemptState::InFlight;
                Ok(Started::InProgress)
            }
            Err(e) => {
                drop(socket);
                Err(self.fail(e.os_error_code()))
            }
        }
    }

    /// Resolves the outcome of an in-flight attempt whose socket polled
    /// ready. Returns `true` on success; on failure the socket is closed and
    /// the error recorded.
    pub(crate) fn settle(&mut self) -> bool {
        let Some(socket) = self.socket.as_ref() else {
            return false;
        };
        match pending_error(socket) {
            0 => {
                self.state = AttemptState::Connected;
                true
            }
            code => {
                self.fail(code);
                false
            }
        }
    }

    /// Closes the socket and marks the slot failed with `code`.
    pub(crate) fn fail(&mut self, code: i32) -> i32 {
        self.socket = None;
        self.error = Some(code);
        self.state = AttemptState::Failed;
        code
    }

    /// Closes the socket of an attempt that lost the race.
    pub(crate) fn abandon(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = socket.shutdown(std::net::Shutdown::Both);
            self.state = AttemptState::Failed;
        }
    }
}

/// Connect outcome of a socket that polled ready: 0 when connected,
/// otherwise the pending errno.
///
/// Asks for the peer name first; a socket that is not connected then has
/// its pending error surfaced through a one-byte read.
pub(crate) fn pending_error(socket: &Socket) -> i32 {
    match socket.peer_addr() {
        Ok(_) => 0,
        Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => {
            let mut byte = [0u8; 1];
            let mut reader = socket;
            match reader.read(&mut byte) {
                Err(e) => e.os_error_code(),
                Ok(_) => libc::ENOTCONN,
            }
        }
        Err(e) => e.os_error_code(),
    }
}
