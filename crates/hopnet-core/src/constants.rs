//! Protocol-wide constants for addressing and the wire format.

/// Wire protocol version carried in bits 0-1 of the version/length byte.
pub const PROTOCOL_VERSION: u8 = 2;

/// Size of the packed frame header in bytes.
pub const HEADER_SIZE: usize = 7;

/// Maximum payload bytes a single frame can carry.
pub const MAX_PAYLOAD: usize = 25;

/// Maximum total frame length (header + payload).
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Address of the gateway, the root of the routing tree.
pub const GATEWAY_ADDRESS: u8 = 0;

/// Broadcast address. Doubles as the AUTO sentinel for nodes that have not
/// yet been assigned an ID by the controller.
pub const BROADCAST_ADDRESS: u8 = 255;

/// Sensor ID used for transport-internal messages.
pub const NODE_SENSOR_ID: u8 = 255;

/// Distance reported by a node that has no route to the gateway.
pub const DISTANCE_INVALID: u8 = 255;

/// Hop count returned when a ping receives no reply.
pub const INVALID_HOPS: u8 = 255;

/// Maximum hop count a ping or pong may accumulate while being relayed.
pub const MAX_HOPS: u8 = 254;
