//! Captured notifications.
//!
//! The network stack hands each notification over as a [`RawNotification`]
//! full of nullable pointers into memory it owns. [`CapturedEvent`] is the
//! owned snapshot the rest of the crate works with: a plain value with
//! structural equality that outlives the raw notification.

pub mod code;
pub mod details;
pub mod raw;

pub use code::EventCode;
pub use details::{
    AddrDetails, NetifDetails, NetworkDetails, NetworkKind, NetworkStatus, NodeDetails,
    PathDetails, PeerDetails, PeerRole, Route, Version,
};
pub use raw::RawNotification;

use crate::error::CaptureError;
use crate::node::NetworkId;

/// Owned snapshot of one notification.
///
/// Each optional field is present iff the corresponding raw pointer was
/// non-null when the notification was captured.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CapturedEvent {
    pub code: EventCode,
    pub node: Option<NodeDetails>,
    pub network: Option<NetworkDetails>,
    pub netif: Option<NetifDetails>,
    pub route: Option<Route>,
    pub path: Option<PathDetails>,
    pub peer: Option<PeerDetails>,
    pub addr: Option<AddrDetails>,
}

impl CapturedEvent {
    /// An event with no substructures.
    pub fn new(code: EventCode) -> Self {
        Self {
            code,
            node: None,
            network: None,
            netif: None,
            route: None,
            path: None,
            peer: None,
            addr: None,
        }
    }

    /// Deep-copies a raw notification.
    ///
    /// Only reads through `raw`; the stack keeps ownership of everything it
    /// points to.
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `raw` must be valid for reads of its pointee
    /// for the duration of this call.
    pub unsafe fn capture(raw: &RawNotification) -> Result<Self, CaptureError> {
        let code = EventCode::from_raw(raw.event_code)?;
        // SAFETY: the caller guarantees each non-null pointer is readable;
        // `as_ref` maps null to `None`.
        unsafe {
            Ok(Self {
                code,
                node: raw.node.as_ref().map(NodeDetails::from),
                network: raw.network.as_ref().map(NetworkDetails::from),
                netif: raw.netif.as_ref().map(NetifDetails::from),
                route: raw.route.as_ref().map(Route::from),
                path: raw.path.as_ref().map(PathDetails::from),
                peer: raw.peer.as_ref().map(PeerDetails::from),
                addr: raw.addr.as_ref().map(AddrDetails::from),
            })
        }
    }

    pub fn with_addr(mut self, addr: AddrDetails) -> Self {
        self.addr = Some(addr);
        self
    }

    /// The network this event concerns, taken from whichever substructure
    /// carries one.
    pub fn nwid(&self) -> Option<NetworkId> {
        self.addr
            .as_ref()
            .map(|a| a.nwid)
            .or_else(|| self.network.as_ref().map(|n| n.nwid))
            .or_else(|| self.netif.as_ref().map(|n| n.nwid))
    }
}
