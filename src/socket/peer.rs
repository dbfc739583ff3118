//! Peer address formatting.

use crate::dns::ip_text;
use socket2::SockRef;
use std::io;
use std::os::fd::AsFd;

/// Text form of the connected peer's IP address, and its port.
///
/// IPv4 peers reached through a dual-stack IPv6 socket are shown as plain
/// IPv4. Peers that are not IP endpoints fail with `ENOTSOCK`.
pub fn peer_name_text<S: AsFd>(socket: &S) -> io::Result<(String, u16)> {
    let peer = SockRef::from(socket).peer_addr()?;
    let addr = peer
        .as_socket()
        .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOTSOCK))?;
    Ok((ip_text(addr.ip()), addr.port()))
}
