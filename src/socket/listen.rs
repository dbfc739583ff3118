//! Passive sockets for inbound service.

use crate::dns::{getaddrinfo, Hints};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;

/// Opens a listening socket on the wildcard address for `service`.
///
/// The lookup asks for `AF_INET6` so one socket accepts IPv4 and IPv6
/// peers where the host allows it. `socket_type` is normally
/// `SOCK_STREAM` or `SOCK_SEQPACKET`. A failed lookup is reported as
/// `EFAULT`.
pub fn listen_by_service(service: &str, socket_type: i32, backlog: i32) -> io::Result<Socket> {
    let hints = Hints::passive(libc::AF_INET6, socket_type);
    let list = getaddrinfo(None, service, &hints).map_err(|e| {
        tracing::debug!(service, error = %e, "passive lookup failed");
        io::Error::from_raw_os_error(libc::EFAULT)
    })?;
    let address = list
        .first()
        .ok_or_else(|| io::Error::from_raw_os_error(libc::EFAULT))?;

    let socket = Socket::new(
        Domain::from(address.family()),
        Type::from(address.socket_type()),
        Some(Protocol::from(address.protocol())),
    )?;
    if let Err(e) = socket.set_reuse_address(true) {
        tracing::debug!(error = %e, "SO_REUSEADDR not set");
    }
    if address.family() == libc::AF_INET6 {
        if let Err(e) = socket.set_only_v6(false) {
            tracing::debug!(error = %e, "listener is IPv6 only");
        }
    }
    socket.bind(&SockAddr::from(address.socket_addr()))?;
    socket.listen(backlog)?;

    tracing::debug!(service, local = ?socket.local_addr().ok().and_then(|a| a.as_socket()), "listening");
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_on_ephemeral_port() {
        let socket = match listen_by_service("0", libc::SOCK_STREAM, 16) {
            Ok(socket) => socket,
            // Hosts without IPv6 cannot open the dual-stack listener.
            Err(e) if e.raw_os_error() == Some(libc::EAFNOSUPPORT) => return,
            Err(e) => panic!("listen failed: {e}"),
        };
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        assert_ne!(local.port(), 0);
        assert!(local.ip().is_unspecified());
    }

    #[test]
    fn test_unknown_service_is_efault() {
        let err = listen_by_service("no-such-service-name", libc::SOCK_STREAM, 16).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EFAULT));
    }
}
