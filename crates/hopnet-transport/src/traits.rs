//! Port traits decoupling the transport core from hardware and host
//! services.
//!
//! The transport is generic over these ports; production code plugs in a
//! real radio driver and durable storage, tests plug in the doubles from
//! [`crate::testing`].

use core::fmt;

use hopnet_core::{Message, NodeId};

/// Link-layer radio driver.
///
/// Frames are opaque byte buffers up to the radio's MTU. `send` reports
/// link-layer delivery only (a broadcast always counts as delivered); it
/// does not attest end-to-end arrival.
pub trait RadioDriver {
    /// Bring up the radio hardware.
    fn init(&mut self) -> bool;

    /// Set the node address the radio listens on.
    fn set_address(&mut self, address: NodeId);

    /// The currently configured node address.
    fn address(&self) -> NodeId;

    /// Send one frame to a neighbor. Blocks for the link-layer ACK window.
    fn send(&mut self, to: NodeId, frame: &[u8]) -> bool;

    /// Whether the receive FIFO holds at least one frame.
    fn available(&self) -> bool;

    /// Copy the next pending frame into `buf`, returning its length.
    /// Returns 0 when the FIFO is empty.
    fn receive(&mut self, buf: &mut [u8]) -> usize;

    /// Probe whether the hardware is still responsive.
    fn sanity_check(&mut self) -> bool;

    /// Power the radio down.
    fn power_down(&mut self);
}

/// Durable storage for node identity, parent, and learned routes.
///
/// All operations are synchronous and durable on return. The transport
/// treats store failures as non-fatal: they are logged and the in-memory
/// state keeps going.
pub trait PersistentStore {
    type Error: fmt::Display;

    /// The stored node ID, or [`NodeId::AUTO`] if none was ever stored.
    fn load_node_id(&mut self) -> Result<NodeId, Self::Error>;

    fn store_node_id(&mut self, id: NodeId) -> Result<(), Self::Error>;

    /// The stored parent and distance, or `(NodeId::AUTO, DISTANCE_INVALID)`
    /// if none was ever stored.
    fn load_parent(&mut self) -> Result<(NodeId, u8), Self::Error>;

    fn store_parent(&mut self, parent: NodeId, distance: u8) -> Result<(), Self::Error>;

    fn load_route(&mut self, destination: NodeId) -> Result<Option<NodeId>, Self::Error>;

    fn store_route(&mut self, destination: NodeId, next_hop: NodeId) -> Result<(), Self::Error>;

    fn clear_routes(&mut self) -> Result<(), Self::Error>;
}

/// Monotonic millisecond counter.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Message signing subsystem.
pub trait Signer {
    /// Whether frames exchanged with `peer` must be signed.
    fn required(&self, peer: NodeId) -> bool;

    /// Sign `message` in place, setting its signed flag.
    /// Returns false when signing is impossible (e.g. no room for the tag).
    fn sign(&mut self, message: &mut Message) -> bool;

    /// Verify an inbound message carrying the signed flag.
    fn verify(&self, message: &Message) -> bool;
}

/// Signer that disables signing entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigning;

impl Signer for NoSigning {
    fn required(&self, _peer: NodeId) -> bool {
        false
    }

    fn sign(&mut self, _message: &mut Message) -> bool {
        true
    }

    fn verify(&self, _message: &Message) -> bool {
        true
    }
}

/// Application-level sink for messages addressed to this node.
pub trait MessageHandler {
    fn handle(&mut self, message: &Message);
}

/// Handler that discards everything. Useful for relays and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropHandler;

impl MessageHandler for DropHandler {
    fn handle(&mut self, _message: &Message) {}
}
