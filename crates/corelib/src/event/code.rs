//! Notification kinds delivered by the network stack.

use std::fmt;

use crate::error::CaptureError;

macro_rules! event_codes {
    ($($(#[$doc:meta])* $variant:ident = $value:literal => $name:literal,)+) => {
        /// Closed set of notification kinds.
        ///
        /// Discriminants are the numeric codes carried in
        /// [`RawNotification::event_code`](super::raw::RawNotification).
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[repr(i32)]
        pub enum EventCode {
            $($(#[$doc])* $variant = $value,)+
        }

        impl EventCode {
            /// Every known code, in numeric order.
            pub const ALL: &'static [EventCode] = &[$(EventCode::$variant,)+];

            /// Maps a raw code onto the closed set.
            pub fn from_raw(code: i32) -> Result<Self, CaptureError> {
                match code {
                    $($value => Ok(EventCode::$variant),)+
                    other => Err(CaptureError::UnknownEventCode(other)),
                }
            }

            /// Upper-snake name used in logs.
            pub fn name(self) -> &'static str {
                match self {
                    $(EventCode::$variant => $name,)+
                }
            }
        }
    };
}

event_codes! {
    NodeOnline = 201 => "NODE_ONLINE",
    NodeOffline = 202 => "NODE_OFFLINE",
    /// The node finished shutting down after `stop`.
    NodeDown = 203 => "NODE_DOWN",
    NodeIdentityCollision = 204 => "NODE_IDENTITY_COLLISION",
    NodeUnrecoverableError = 205 => "NODE_UNRECOVERABLE_ERROR",
    NodeNormalTermination = 206 => "NODE_NORMAL_TERMINATION",
    NetworkNotFound = 210 => "NETWORK_NOT_FOUND",
    NetworkClientTooOld = 211 => "NETWORK_CLIENT_TOO_OLD",
    NetworkRequestingConfig = 212 => "NETWORK_REQUESTING_CONFIG",
    NetworkOk = 213 => "NETWORK_OK",
    NetworkAccessDenied = 214 => "NETWORK_ACCESS_DENIED",
    NetworkReadyIp4 = 215 => "NETWORK_READY_IP4",
    NetworkReadyIp6 = 216 => "NETWORK_READY_IP6",
    NetworkReadyIp4Ip6 = 217 => "NETWORK_READY_IP4_IP6",
    NetworkDown = 218 => "NETWORK_DOWN",
    StackUp = 220 => "STACK_UP",
    StackDown = 221 => "STACK_DOWN",
    NetifUp = 230 => "NETIF_UP",
    NetifDown = 231 => "NETIF_DOWN",
    NetifRemoved = 232 => "NETIF_REMOVED",
    NetifLinkUp = 233 => "NETIF_LINK_UP",
    NetifLinkDown = 234 => "NETIF_LINK_DOWN",
    PeerDirect = 240 => "PEER_DIRECT",
    PeerRelay = 241 => "PEER_RELAY",
    PeerUnreachable = 242 => "PEER_UNREACHABLE",
    PathDiscovered = 243 => "PATH_DISCOVERED",
    PathAlive = 244 => "PATH_ALIVE",
    PathDead = 245 => "PATH_DEAD",
    RouteAdded = 250 => "ROUTE_ADDED",
    RouteRemoved = 251 => "ROUTE_REMOVED",
    AddrAddedIp4 = 260 => "ADDR_ADDED_IP4",
    AddrRemovedIp4 = 261 => "ADDR_REMOVED_IP4",
    AddrAddedIp6 = 262 => "ADDR_ADDED_IP6",
    AddrRemovedIp6 = 263 => "ADDR_REMOVED_IP6",
}

impl EventCode {
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// True for notifications after which the node will not deliver more.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventCode::NodeDown
                | EventCode::NodeUnrecoverableError
                | EventCode::NodeNormalTermination
        )
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
