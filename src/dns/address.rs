//! Resolved address records and lookup hints.
//!
//! A [`ResolvedAddress`] is the owned form of one `addrinfo` entry. The rest
//! of the crate only ever reads these; candidate ordering works on borrowed
//! references into a [`ResolvedList`].

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// One resolved address: family, socket type, protocol, socket address and
/// optional canonical name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedAddress {
    family: i32,
    socket_type: i32,
    protocol: i32,
    addr: SocketAddr,
    canonical_name: Option<Box<str>>,
}

impl ResolvedAddress {
    /// A TCP stream address for `addr`, with the family derived from it.
    pub fn new(addr: SocketAddr) -> Self {
        let family = if addr.is_ipv4() {
            libc::AF_INET
        } else {
            libc::AF_INET6
        };
        Self {
            family,
            socket_type: libc::SOCK_STREAM,
            protocol: libc::IPPROTO_TCP,
            addr,
            canonical_name: None,
        }
    }

    /// Builds a record from its raw `addrinfo` fields.
    ///
    /// The family, socket type and protocol are passed through to `socket(2)`
    /// untouched, so they do not have to agree with `addr`.
    pub fn from_parts(
        family: i32,
        socket_type: i32,
        protocol: i32,
        addr: SocketAddr,
        canonical_name: Option<String>,
    ) -> Self {
        Self {
            family,
            socket_type,
            protocol,
            addr,
            canonical_name: canonical_name.map(String::into_boxed_str),
        }
    }

    pub fn family(&self) -> i32 {
        self.family
    }

    pub fn socket_type(&self) -> i32 {
        self.socket_type
    }

    pub fn protocol(&self) -> i32 {
        self.protocol
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn canonical_name(&self) -> Option<&str> {
        self.canonical_name.as_deref()
    }

    /// Length of the native `sockaddr` this address encodes to.
    pub fn addr_len(&self) -> usize {
        match self.addr {
            SocketAddr::V4(_) => std::mem::size_of::<libc::sockaddr_in>(),
            SocketAddr::V6(_) => std::mem::size_of::<libc::sockaddr_in6>(),
        }
    }

    /// Structural equality used for preference and exclusion matching:
    /// same family, socket type, protocol and address bytes.
    ///
    /// The canonical name is ignored. Address bytes are compared through
    /// their decoded form (IP, port, and for IPv6 flow info and scope id),
    /// which is what two byte-identical `sockaddr`s decode to.
    pub fn same_address(&self, other: &ResolvedAddress) -> bool {
        self.family == other.family
            && self.socket_type == other.socket_type
            && self.protocol == other.protocol
            && self.addr == other.addr
    }
}

impl From<SocketAddr> for ResolvedAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.family == libc::AF_INET || self.family == libc::AF_INET6 {
            fmt::Display::fmt(&self.addr.ip(), f)
        } else {
            write!(f, "unknown_family_{}", self.family)
        }
    }
}

/// The ordered result of one name lookup.
///
/// Entry order is the order the resolver returned them in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedList {
    addresses: Vec<ResolvedAddress>,
}

impl ResolvedList {
    pub fn new(addresses: Vec<ResolvedAddress>) -> Self {
        Self { addresses }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn first(&self) -> Option<&ResolvedAddress> {
        self.addresses.first()
    }

    pub fn get(&self, index: usize) -> Option<&ResolvedAddress> {
        self.addresses.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedAddress> {
        self.addresses.iter()
    }

    pub fn as_slice(&self) -> &[ResolvedAddress] {
        &self.addresses
    }
}

impl From<Vec<ResolvedAddress>> for ResolvedList {
    fn from(addresses: Vec<ResolvedAddress>) -> Self {
        Self::new(addresses)
    }
}

impl FromIterator<SocketAddr> for ResolvedList {
    fn from_iter<I: IntoIterator<Item = SocketAddr>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(ResolvedAddress::new).collect())
    }
}

impl IntoIterator for ResolvedList {
    type Item = ResolvedAddress;
    type IntoIter = std::vec::IntoIter<ResolvedAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResolvedList {
    type Item = &'a ResolvedAddress;
    type IntoIter = std::slice::Iter<'a, ResolvedAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

/// `getaddrinfo` hints. Only the four input fields are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hints {
    pub family: i32,
    pub socket_type: i32,
    pub protocol: i32,
    pub flags: i32,
}

impl Hints {
    /// Any Internet family, stream sockets, and only families configured
    /// on this host. `AI_V4MAPPED` is left out so no IPv4-mapped IPv6
    /// addresses are synthesized.
    pub fn stream() -> Self {
        Self {
            family: libc::AF_UNSPEC,
            socket_type: libc::SOCK_STREAM,
            protocol: 0,
            flags: libc::AI_ADDRCONFIG,
        }
    }

    /// Wildcard-address hints for opening a listener.
    pub fn passive(family: i32, socket_type: i32) -> Self {
        Self {
            family,
            socket_type,
            protocol: 0,
            flags: libc::AI_PASSIVE,
        }
    }
}

impl Default for Hints {
    fn default() -> Self {
        Self::stream()
    }
}

/// Decodes a native `sockaddr`. Returns `None` for non-IP families and
/// truncated buffers.
///
/// # Safety
///
/// `addr` must be null or point to at least `len` readable bytes.
pub(crate) unsafe fn socket_addr_from_raw(
    addr: *const libc::sockaddr,
    len: libc::socklen_t,
) -> Option<SocketAddr> {
    if addr.is_null() {
        return None;
    }
    let len = len as usize;
    match i32::from((*addr).sa_family) {
        libc::AF_INET if len >= std::mem::size_of::<libc::sockaddr_in>() => {
            let sin = &*(addr as *const libc::sockaddr_in);
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        libc::AF_INET6 if len >= std::mem::size_of::<libc::sockaddr_in6>() => {
            let sin6 = &*(addr as *const libc::sockaddr_in6);
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

/// Text form of an IP address, with IPv4-mapped IPv6 addresses shown as
/// plain IPv4.
pub(crate) fn ip_text(ip: IpAddr) -> String {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}
