use thiserror::Error;

/// Errors surfaced by the connection race and by `connect_by_name`.
///
/// Every variant maps onto a native errno through [`NetError::os_error`], so
/// callers that speak the platform error domain lose nothing by going through
/// this type.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    /// Candidate construction left nothing to attempt (all excluded, or
    /// pinned to a preferred set that matched nothing).
    #[error("No candidate addresses to connect to")]
    NoCandidates,
    /// Allocation or readiness multiplexing failed; the race was abandoned.
    #[error("Out of memory")]
    OutOfMemory,
    /// The race deadline passed before any candidate connected.
    #[error("Connection timed out (os error {os_error})")]
    ConnectionTimedOut { os_error: i32 },
    /// Every candidate was attempted and every attempt failed.
    #[error("All candidate addresses failed (os error {os_error})")]
    CandidatesExhausted { os_error: i32 },
    /// Name lookup failed or ran out of budget. The resolver's own code is
    /// reported through `ConnectOptions::resolver_error`.
    #[error("Address invalid")]
    AddressInvalid,
    /// The race could not finish on the runtime: its blocking task was
    /// cancelled or panicked, or the winner could not be handed over.
    #[error("Connection race aborted")]
    RaceAborted,
}

impl NetError {
    /// Native errno equivalent of this error.
    pub fn os_error(&self) -> i32 {
        match self {
            // A race that cannot be constructed reports ENOMEM, same as an
            // allocation failure.
            NetError::NoCandidates => libc::ENOMEM,
            NetError::OutOfMemory => libc::ENOMEM,
            NetError::ConnectionTimedOut { os_error } => *os_error,
            NetError::CandidatesExhausted { os_error } => *os_error,
            NetError::AddressInvalid => libc::EFAULT,
            NetError::RaceAborted => libc::ECANCELED,
        }
    }

    /// True when the failure was caused by the deadline rather than by the
    /// candidates themselves.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::ConnectionTimedOut { .. })
    }
}

impl From<NetError> for std::io::Error {
    fn from(err: NetError) -> Self {
        std::io::Error::from_raw_os_error(err.os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_error_mapping() {
        assert_eq!(NetError::OutOfMemory.os_error(), libc::ENOMEM);
        assert_eq!(NetError::NoCandidates.os_error(), libc::ENOMEM);
        assert_eq!(NetError::AddressInvalid.os_error(), libc::EFAULT);
        assert_eq!(
            NetError::ConnectionTimedOut { os_error: libc::ECONNREFUSED }.os_error(),
            libc::ECONNREFUSED
        );
        assert_eq!(
            NetError::CandidatesExhausted { os_error: libc::EBADF }.os_error(),
            libc::EBADF
        );
    }

    #[test]
    fn test_into_io_error_keeps_errno() {
        let err: std::io::Error = NetError::ConnectionTimedOut { os_error: libc::ETIMEDOUT }.into();
        assert_eq!(err.raw_os_error(), Some(libc::ETIMEDOUT));
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_is_timeout() {
        assert!(NetError::ConnectionTimedOut { os_error: libc::ETIMEDOUT }.is_timeout());
        assert!(!NetError::CandidatesExhausted { os_error: libc::ETIMEDOUT }.is_timeout());
    }
}
