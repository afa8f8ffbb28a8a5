//! Newtype wrapper for node addresses.
//!
//! Addresses are a single byte with two reserved values: 0 is the gateway
//! and 255 is the broadcast address, which also serves as the AUTO sentinel
//! for nodes awaiting a controller-assigned ID.

use core::fmt;

use crate::constants::{BROADCAST_ADDRESS, GATEWAY_ADDRESS};

/// A one-byte node address.
///
/// Assignable node IDs are 1..=254.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct NodeId(u8);

impl NodeId {
    /// The gateway, root of the routing tree.
    pub const GATEWAY: NodeId = NodeId(GATEWAY_ADDRESS);
    /// The broadcast address.
    pub const BROADCAST: NodeId = NodeId(BROADCAST_ADDRESS);
    /// The unassigned-ID sentinel (same raw value as broadcast).
    pub const AUTO: NodeId = NodeId(BROADCAST_ADDRESS);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw address byte.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_gateway(self) -> bool {
        self.0 == GATEWAY_ADDRESS
    }

    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == BROADCAST_ADDRESS
    }

    /// Whether this ID is an actual address rather than the AUTO sentinel.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != BROADCAST_ADDRESS
    }

    /// Whether this ID may be handed to a regular node by the controller.
    #[must_use]
    pub const fn is_assignable(self) -> bool {
        self.0 != GATEWAY_ADDRESS && self.0 != BROADCAST_ADDRESS
    }
}

impl From<u8> for NodeId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<NodeId> for u8 {
    fn from(id: NodeId) -> u8 {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            GATEWAY_ADDRESS => write!(f, "NodeId(gateway)"),
            BROADCAST_ADDRESS => write!(f, "NodeId(broadcast)"),
            raw => write!(f, "NodeId({raw})"),
        }
    }
}
