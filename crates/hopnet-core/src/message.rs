//! The message envelope routed by the transport.
//!
//! A [`Message`] mirrors the wire header fields plus the payload. The
//! `next` field is envelope metadata: the router fills it with the chosen
//! link target before handing the frame to the radio, and it is not part
//! of the serialized wire image.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::constants::NODE_SENSOR_ID;
use crate::error::WireError;
use crate::types::NodeId;

/// Top-level command carried in bits 0-2 of the command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Presentation = 0,
    Set = 1,
    Req = 2,
    Internal = 3,
    Stream = 4,
}

impl Command {
    /// Decode from the 3 command bits.
    pub fn from_bits(bits: u8) -> Result<Self, WireError> {
        match bits {
            0 => Ok(Command::Presentation),
            1 => Ok(Command::Set),
            2 => Ok(Command::Req),
            3 => Ok(Command::Internal),
            4 => Ok(Command::Stream),
            other => Err(WireError::InvalidCommand(other)),
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Internal message types handled by the transport.
///
/// Discriminants match the serial protocol; internal types the transport
/// does not act on are passed through to the application unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalType {
    /// Node asks the controller for an ID.
    IdRequest = 3,
    /// Controller assigns an ID (payload byte 0).
    IdResponse = 4,
    /// Broadcast looking for a parent.
    FindParentRequest = 7,
    /// Answer carrying the responder's distance to the gateway (payload byte 0).
    FindParentResponse = 8,
    /// Controlled-flood broadcast; payload byte 0 is the remaining hop budget.
    Discover = 20,
    /// Ping; payload byte 0 is the hop counter, incremented per relay.
    Ping = 24,
    /// Ping reply; payload byte 0 is the accumulated hop count.
    Pong = 25,
}

impl InternalType {
    /// Decode a transport-relevant internal type; `None` for types the
    /// transport forwards to the application.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            3 => Some(InternalType::IdRequest),
            4 => Some(InternalType::IdResponse),
            7 => Some(InternalType::FindParentRequest),
            8 => Some(InternalType::FindParentResponse),
            20 => Some(InternalType::Discover),
            24 => Some(InternalType::Ping),
            25 => Some(InternalType::Pong),
            _ => None,
        }
    }

    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

/// Payload data type carried in bits 5-7 of the command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    String = 0,
    Byte = 1,
    Int16 = 2,
    Uint16 = 3,
    Long32 = 4,
    Ulong32 = 5,
    Custom = 6,
    Float32 = 7,
}

impl PayloadType {
    /// Decode from the 3 payload-type bits. Total, since all 8 values are defined.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => PayloadType::String,
            1 => PayloadType::Byte,
            2 => PayloadType::Int16,
            3 => PayloadType::Uint16,
            4 => PayloadType::Long32,
            5 => PayloadType::Ulong32,
            6 => PayloadType::Custom,
            _ => PayloadType::Float32,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// A routed message: the wire header fields plus payload.
#[derive(Clone, PartialEq, Eq)]
#[must_use]
pub struct Message {
    /// Originating node.
    pub sender: NodeId,
    /// The neighbor that most recently forwarded this frame.
    pub last: NodeId,
    /// Link target chosen by the router. Not serialized.
    pub next: NodeId,
    /// Final destination.
    pub destination: NodeId,
    /// Sensor this message concerns; `NODE_SENSOR_ID` for internal traffic.
    pub sensor: u8,
    pub command: Command,
    /// Command-specific message type.
    pub msg_type: u8,
    pub payload_type: PayloadType,
    /// Sender asks the receiver to echo the message back as an ACK.
    pub request_ack: bool,
    /// This frame is the echoed ACK.
    pub is_ack: bool,
    /// The payload is followed by a signature the receiver must verify.
    pub signed: bool,
    pub payload: Vec<u8>,
}

impl Message {
    /// A new message with an empty string payload.
    pub fn new(
        sender: NodeId,
        destination: NodeId,
        sensor: u8,
        command: Command,
        msg_type: u8,
    ) -> Self {
        Self {
            sender,
            last: sender,
            next: NodeId::AUTO,
            destination,
            sensor,
            command,
            msg_type,
            payload_type: PayloadType::String,
            request_ack: false,
            is_ack: false,
            signed: false,
            payload: Vec::new(),
        }
    }

    /// A transport-internal message.
    pub fn internal(sender: NodeId, destination: NodeId, itype: InternalType) -> Self {
        Self::new(
            sender,
            destination,
            NODE_SENSOR_ID,
            Command::Internal,
            itype.byte(),
        )
    }

    /// Replace the payload with a single byte.
    pub fn with_byte(mut self, value: u8) -> Self {
        self.payload = vec![value];
        self.payload_type = PayloadType::Byte;
        self
    }

    /// The internal type, when this is a transport-relevant internal message.
    #[must_use]
    pub fn internal_type(&self) -> Option<InternalType> {
        if self.command == Command::Internal {
            InternalType::from_byte(self.msg_type)
        } else {
            None
        }
    }

    /// First payload byte, if any.
    #[must_use]
    pub fn byte_payload(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("sender", &self.sender)
            .field("last", &self.last)
            .field("destination", &self.destination)
            .field("command", &self.command)
            .field("msg_type", &self.msg_type)
            .field("len", &self.payload.len())
            .finish_non_exhaustive()
    }
}
