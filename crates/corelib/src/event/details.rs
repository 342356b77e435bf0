//! Owned substructures carried by a [`CapturedEvent`](super::CapturedEvent).
//!
//! Each type is built from its raw counterpart by value; array counts coming
//! from the stack are clamped to the array capacity.

use std::fmt;
use std::net::SocketAddr;

use super::raw::{
    c_name, RawAddrDetails, RawNetifDetails, RawNetworkDetails, RawNodeDetails, RawPathDetails,
    RawPeerDetails, RawRoute, RawSockAddr,
};
use crate::node::{NetworkId, NodeId};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub rev: i32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.rev)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NodeDetails {
    pub id: NodeId,
    pub primary_port: u16,
    pub secondary_port: u16,
    pub tertiary_port: u16,
    pub version: Version,
}

impl From<&RawNodeDetails> for NodeDetails {
    fn from(raw: &RawNodeDetails) -> Self {
        Self {
            id: NodeId::new(raw.address),
            primary_port: raw.primary_port,
            secondary_port: raw.secondary_port,
            tertiary_port: raw.tertiary_port,
            version: Version {
                major: raw.ver_major.into(),
                minor: raw.ver_minor.into(),
                rev: raw.ver_rev.into(),
            },
        }
    }
}

/// Configuration state of a joined network.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NetworkStatus {
    RequestingConfiguration,
    Ok,
    AccessDenied,
    NotFound,
    PortError,
    ClientTooOld,
    Other(i32),
}

impl NetworkStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => NetworkStatus::RequestingConfiguration,
            1 => NetworkStatus::Ok,
            2 => NetworkStatus::AccessDenied,
            3 => NetworkStatus::NotFound,
            4 => NetworkStatus::PortError,
            5 => NetworkStatus::ClientTooOld,
            other => NetworkStatus::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            NetworkStatus::RequestingConfiguration => 0,
            NetworkStatus::Ok => 1,
            NetworkStatus::AccessDenied => 2,
            NetworkStatus::NotFound => 3,
            NetworkStatus::PortError => 4,
            NetworkStatus::ClientTooOld => 5,
            NetworkStatus::Other(other) => other,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NetworkKind {
    Private,
    Public,
    Other(i32),
}

impl NetworkKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => NetworkKind::Private,
            1 => NetworkKind::Public,
            other => NetworkKind::Other(other),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Route {
    pub target: Option<SocketAddr>,
    pub via: Option<SocketAddr>,
    pub flags: u16,
    pub metric: u16,
}

impl From<&RawRoute> for Route {
    fn from(raw: &RawRoute) -> Self {
        Self {
            target: raw.target.to_socket_addr(),
            via: raw.via.to_socket_addr(),
            flags: raw.flags,
            metric: raw.metric,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NetworkDetails {
    pub nwid: NetworkId,
    pub mac: u64,
    pub name: String,
    pub status: NetworkStatus,
    pub kind: NetworkKind,
    pub mtu: u32,
    pub dhcp: bool,
    pub bridge: bool,
    pub broadcast_enabled: bool,
    pub port_error: i32,
    pub netconf_rev: u64,
    pub assigned_addrs: Vec<SocketAddr>,
    pub routes: Vec<Route>,
}

impl From<&RawNetworkDetails> for NetworkDetails {
    fn from(raw: &RawNetworkDetails) -> Self {
        let addr_count = (raw.assigned_addr_count as usize).min(raw.assigned_addrs.len());
        let route_count = (raw.route_count as usize).min(raw.routes.len());
        Self {
            nwid: NetworkId(raw.nwid),
            mac: raw.mac,
            name: c_name(&raw.name),
            status: NetworkStatus::from_raw(raw.status),
            kind: NetworkKind::from_raw(raw.kind),
            mtu: raw.mtu,
            dhcp: raw.dhcp != 0,
            bridge: raw.bridge != 0,
            broadcast_enabled: raw.broadcast_enabled != 0,
            port_error: raw.port_error,
            netconf_rev: raw.netconf_rev,
            assigned_addrs: raw.assigned_addrs[..addr_count]
                .iter()
                .filter_map(RawSockAddr::to_socket_addr)
                .collect(),
            routes: raw.routes[..route_count].iter().map(Route::from).collect(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NetifDetails {
    pub nwid: NetworkId,
    pub mac: u64,
    pub mtu: i32,
}

impl From<&RawNetifDetails> for NetifDetails {
    fn from(raw: &RawNetifDetails) -> Self {
        Self {
            nwid: NetworkId(raw.nwid),
            mac: raw.mac,
            mtu: raw.mtu,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PathDetails {
    pub address: Option<SocketAddr>,
}

impl From<&RawPathDetails> for PathDetails {
    fn from(raw: &RawPathDetails) -> Self {
        Self {
            address: raw.address.to_socket_addr(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PeerRole {
    Leaf,
    Moon,
    Planet,
    Other(i32),
}

impl PeerRole {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => PeerRole::Leaf,
            1 => PeerRole::Moon,
            2 => PeerRole::Planet,
            other => PeerRole::Other(other),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PeerDetails {
    pub id: NodeId,
    pub version: Version,
    /// Milliseconds; negative when unknown.
    pub latency: i32,
    pub role: PeerRole,
    pub paths: Vec<SocketAddr>,
}

impl From<&RawPeerDetails> for PeerDetails {
    fn from(raw: &RawPeerDetails) -> Self {
        let path_count = (raw.path_count as usize).min(raw.paths.len());
        Self {
            id: NodeId::new(raw.address),
            version: Version {
                major: raw.ver_major,
                minor: raw.ver_minor,
                rev: raw.ver_rev,
            },
            latency: raw.latency,
            role: PeerRole::from_raw(raw.role),
            paths: raw.paths[..path_count]
                .iter()
                .filter_map(RawSockAddr::to_socket_addr)
                .collect(),
        }
    }
}

/// Address assigned to (or removed from) this node on a network.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AddrDetails {
    pub nwid: NetworkId,
    pub addr: Option<SocketAddr>,
}

impl From<&RawAddrDetails> for AddrDetails {
    fn from(raw: &RawAddrDetails) -> Self {
        Self {
            nwid: NetworkId(raw.nwid),
            addr: raw.addr.to_socket_addr(),
        }
    }
}
