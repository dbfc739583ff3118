use thiserror::Error;

/// Resolver failures, in the `getaddrinfo` error domain.
///
/// A lookup that runs out of budget is reported as [`ResolverError::Again`],
/// the same code a transient resolver failure produces; the two are not
/// told apart at this layer.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ResolverError {
    #[error("Temporary failure in name resolution")]
    Again,
    #[error("Bad value for resolver flags")]
    BadFlags,
    #[error("Non-recoverable failure in name resolution")]
    Fail,
    #[error("Address family not supported")]
    Family,
    #[error("Memory allocation failure")]
    Memory,
    #[error("Name or service not known")]
    NoName,
    #[error("Service not supported for socket type")]
    Service,
    #[error("Socket type not supported")]
    SocketType,
    #[error("Argument buffer overflow")]
    Overflow,
    #[error("System error (os error {0})")]
    System(i32),
    #[error("Unknown resolver error: {0}")]
    Other(i32),
}

impl ResolverError {
    /// The native `EAI_*` code. `System` reports `EAI_SYSTEM`; its errno is
    /// available through [`ResolverError::os_error`].
    pub fn code(&self) -> i32 {
        match self {
            ResolverError::Again => libc::EAI_AGAIN,
            ResolverError::BadFlags => libc::EAI_BADFLAGS,
            ResolverError::Fail => libc::EAI_FAIL,
            ResolverError::Family => libc::EAI_FAMILY,
            ResolverError::Memory => libc::EAI_MEMORY,
            ResolverError::NoName => libc::EAI_NONAME,
            ResolverError::Service => libc::EAI_SERVICE,
            ResolverError::SocketType => libc::EAI_SOCKTYPE,
            ResolverError::Overflow => libc::EAI_OVERFLOW,
            ResolverError::System(_) => libc::EAI_SYSTEM,
            ResolverError::Other(code) => *code,
        }
    }

    /// Maps a `getaddrinfo` return code. `EAI_SYSTEM` picks up `errno`.
    pub fn from_code(code: i32) -> Self {
        match code {
            libc::EAI_AGAIN => ResolverError::Again,
            libc::EAI_BADFLAGS => ResolverError::BadFlags,
            libc::EAI_FAIL => ResolverError::Fail,
            libc::EAI_FAMILY => ResolverError::Family,
            libc::EAI_MEMORY => ResolverError::Memory,
            libc::EAI_NONAME => ResolverError::NoName,
            libc::EAI_SERVICE => ResolverError::Service,
            libc::EAI_SOCKTYPE => ResolverError::SocketType,
            libc::EAI_OVERFLOW => ResolverError::Overflow,
            libc::EAI_SYSTEM => ResolverError::System(
                std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
            ),
            other => ResolverError::Other(other),
        }
    }

    /// The errno behind an `EAI_SYSTEM` failure.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            ResolverError::System(errno) => Some(*errno),
            _ => None,
        }
    }

    /// True for both budget exhaustion and transient resolver failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolverError::Again)
    }
}
