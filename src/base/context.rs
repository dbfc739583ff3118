//! Native error code extraction.
//!
//! The race aggregates per-candidate failures by raw errno, so every
//! `io::Error` that comes out of a socket call has to be reduced to one.

use std::io;

/// Extension trait for reducing IO errors to an OS error number.
pub trait OsErrorExt {
    /// The raw OS error, or the closest errno for synthetic errors.
    ///
    /// # Example
    /// ```ignore
    /// use racenet::base::context::OsErrorExt;
    ///
    /// let code = socket.connect(&addr).unwrap_err().os_error_code();
    /// ```
    fn os_error_code(&self) -> i32;
}

impl OsErrorExt for io::Error {
    fn os_error_code(&self) -> i32 {
        if let Some(code) = self.raw_os_error() {
            return code;
        }
        match self.kind() {
            io::ErrorKind::WouldBlock => libc::EAGAIN,
            io::ErrorKind::Interrupted => libc::EINTR,
            io::ErrorKind::TimedOut => libc::ETIMEDOUT,
            io::ErrorKind::ConnectionRefused => libc::ECONNREFUSED,
            io::ErrorKind::ConnectionReset => libc::ECONNRESET,
            io::ErrorKind::NotConnected => libc::ENOTCONN,
            io::ErrorKind::InvalidInput => libc::EINVAL,
            io::ErrorKind::OutOfMemory => libc::ENOMEM,
            _ => libc::EIO,
        }
    }
}
