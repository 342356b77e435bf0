//! C-layout notification structures as handed over by the network stack.
//!
//! The stack owns this memory and may reclaim it as soon as the callback
//! returns. Nothing in this module frees or retains it; see
//! [`CapturedEvent::capture`](super::CapturedEvent::capture) for the copy.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::ptr;

pub const MAX_ASSIGNED_ADDRESSES: usize = 16;
pub const MAX_NETWORK_ROUTES: usize = 32;
pub const MAX_PEER_PATHS: usize = 16;
pub const MAX_NETWORK_NAME: usize = 128;

pub const FAMILY_UNSPEC: u16 = 0;
pub const FAMILY_IPV4: u16 = 4;
pub const FAMILY_IPV6: u16 = 6;

/// Socket address in a fixed layout. IPv4 uses the first four octets.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawSockAddr {
    pub family: u16,
    /// Host byte order.
    pub port: u16,
    pub addr: [u8; 16],
}

impl RawSockAddr {
    pub const UNSPECIFIED: RawSockAddr = RawSockAddr {
        family: FAMILY_UNSPEC,
        port: 0,
        addr: [0; 16],
    };

    /// `None` for an unspecified or unknown family.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let ip = match self.family {
            FAMILY_IPV4 => {
                let [a, b, c, d, ..] = self.addr;
                IpAddr::V4(Ipv4Addr::new(a, b, c, d))
            }
            FAMILY_IPV6 => IpAddr::V6(Ipv6Addr::from(self.addr)),
            _ => return None,
        };
        Some(SocketAddr::new(ip, self.port))
    }
}

impl From<SocketAddr> for RawSockAddr {
    fn from(sa: SocketAddr) -> Self {
        let mut addr = [0u8; 16];
        let family = match sa.ip() {
            IpAddr::V4(v4) => {
                addr[..4].copy_from_slice(&v4.octets());
                FAMILY_IPV4
            }
            IpAddr::V6(v6) => {
                addr = v6.octets();
                FAMILY_IPV6
            }
        };
        Self {
            family,
            port: sa.port(),
            addr,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RawNodeDetails {
    pub address: u64,
    pub primary_port: u16,
    pub secondary_port: u16,
    pub tertiary_port: u16,
    pub ver_major: u8,
    pub ver_minor: u8,
    pub ver_rev: u8,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRoute {
    pub target: RawSockAddr,
    pub via: RawSockAddr,
    pub flags: u16,
    pub metric: u16,
}

impl RawRoute {
    pub const EMPTY: RawRoute = RawRoute {
        target: RawSockAddr::UNSPECIFIED,
        via: RawSockAddr::UNSPECIFIED,
        flags: 0,
        metric: 0,
    };
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawNetworkDetails {
    pub nwid: u64,
    pub mac: u64,
    /// NUL-terminated UTF-8.
    pub name: [u8; MAX_NETWORK_NAME],
    pub status: i32,
    pub kind: i32,
    pub mtu: u32,
    pub dhcp: u8,
    pub bridge: u8,
    pub broadcast_enabled: u8,
    pub port_error: i32,
    pub netconf_rev: u64,
    pub assigned_addr_count: u32,
    pub assigned_addrs: [RawSockAddr; MAX_ASSIGNED_ADDRESSES],
    pub route_count: u32,
    pub routes: [RawRoute; MAX_NETWORK_ROUTES],
}

impl RawNetworkDetails {
    pub fn empty(nwid: u64) -> Self {
        Self {
            nwid,
            mac: 0,
            name: [0; MAX_NETWORK_NAME],
            status: 0,
            kind: 0,
            mtu: 0,
            dhcp: 0,
            bridge: 0,
            broadcast_enabled: 0,
            port_error: 0,
            netconf_rev: 0,
            assigned_addr_count: 0,
            assigned_addrs: [RawSockAddr::UNSPECIFIED; MAX_ASSIGNED_ADDRESSES],
            route_count: 0,
            routes: [RawRoute::EMPTY; MAX_NETWORK_ROUTES],
        }
    }

    /// Copies `name` in, truncating so a terminating NUL always fits.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; MAX_NETWORK_NAME];
        let len = name.len().min(MAX_NETWORK_NAME - 1);
        self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RawNetifDetails {
    pub nwid: u64,
    pub mac: u64,
    pub mtu: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawPathDetails {
    pub address: RawSockAddr,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawPeerDetails {
    pub address: u64,
    pub ver_major: i32,
    pub ver_minor: i32,
    pub ver_rev: i32,
    pub latency: i32,
    pub role: i32,
    pub path_count: u32,
    pub paths: [RawSockAddr; MAX_PEER_PATHS],
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawAddrDetails {
    pub nwid: u64,
    pub addr: RawSockAddr,
}

/// One notification as passed to the stack's global callback.
///
/// Every pointer is either null or valid for reads for the duration of the
/// callback only.
#[repr(C)]
#[derive(Debug)]
pub struct RawNotification {
    pub event_code: i32,
    pub node: *const RawNodeDetails,
    pub network: *const RawNetworkDetails,
    pub netif: *const RawNetifDetails,
    pub route: *const RawRoute,
    pub path: *const RawPathDetails,
    pub peer: *const RawPeerDetails,
    pub addr: *const RawAddrDetails,
}

impl RawNotification {
    /// A notification with no substructures attached.
    pub fn new(event_code: i32) -> Self {
        Self {
            event_code,
            node: ptr::null(),
            network: ptr::null(),
            netif: ptr::null(),
            route: ptr::null(),
            path: ptr::null(),
            peer: ptr::null(),
            addr: ptr::null(),
        }
    }
}

/// Reads a NUL-terminated byte buffer, replacing invalid UTF-8.
pub(crate) fn c_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
