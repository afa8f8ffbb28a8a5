//! Packed wire codec for the 7-byte frame header.
//!
//! Layout:
//!
//! ```text
//! offset 0  last-hop node ID
//! offset 1  sender node ID
//! offset 2  destination node ID
//! offset 3  bits 0-1 protocol version, bit 2 signed flag, bits 3-7 payload length
//! offset 4  bits 0-2 command, bit 3 ack-request, bit 4 is-ack, bits 5-7 payload type
//! offset 5  message type
//! offset 6  sensor ID
//! ```
//!
//! The payload follows immediately. Frames longer than the declared payload
//! length are accepted; the excess is radio padding and is ignored.

extern crate alloc;

use alloc::vec::Vec;

use crate::constants::{HEADER_SIZE, MAX_PAYLOAD, PROTOCOL_VERSION};
use crate::error::WireError;
use crate::message::{Command, Message, PayloadType};
use crate::types::NodeId;

const VERSION_MASK: u8 = 0x03;
const SIGNED_BIT: u8 = 0x04;
const LENGTH_SHIFT: u8 = 3;
const COMMAND_MASK: u8 = 0x07;
const REQUEST_ACK_BIT: u8 = 0x08;
const IS_ACK_BIT: u8 = 0x10;
const PAYLOAD_TYPE_SHIFT: u8 = 5;

/// Serialize a message into its radio frame.
pub fn encode(message: &Message) -> Result<Vec<u8>, WireError> {
    let len = message.payload.len();
    if len > MAX_PAYLOAD {
        return Err(WireError::PayloadTooLong {
            max: MAX_PAYLOAD,
            actual: len,
        });
    }

    let mut version_length = PROTOCOL_VERSION & VERSION_MASK;
    if message.signed {
        version_length |= SIGNED_BIT;
    }
    version_length |= (len as u8) << LENGTH_SHIFT;

    let mut command_byte = message.command.bits() & COMMAND_MASK;
    if message.request_ack {
        command_byte |= REQUEST_ACK_BIT;
    }
    if message.is_ack {
        command_byte |= IS_ACK_BIT;
    }
    command_byte |= message.payload_type.bits() << PAYLOAD_TYPE_SHIFT;

    let mut frame = Vec::with_capacity(HEADER_SIZE + len);
    frame.push(message.last.raw());
    frame.push(message.sender.raw());
    frame.push(message.destination.raw());
    frame.push(version_length);
    frame.push(command_byte);
    frame.push(message.msg_type);
    frame.push(message.sensor);
    frame.extend_from_slice(&message.payload);
    Ok(frame)
}

/// Parse a radio frame.
///
/// Rejects frames shorter than the header, frames built for a different
/// protocol version, and frames whose declared payload length exceeds the
/// buffer.
pub fn parse(raw: &[u8]) -> Result<Message, WireError> {
    if raw.len() < HEADER_SIZE {
        return Err(WireError::TooShort {
            min: HEADER_SIZE,
            actual: raw.len(),
        });
    }

    let version = raw[3] & VERSION_MASK;
    if version != PROTOCOL_VERSION {
        return Err(WireError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }

    let declared = (raw[3] >> LENGTH_SHIFT) as usize;
    let available = raw.len() - HEADER_SIZE;
    if declared > available {
        return Err(WireError::LengthMismatch {
            declared,
            available,
        });
    }

    let command = Command::from_bits(raw[4] & COMMAND_MASK)?;

    Ok(Message {
        last: NodeId::new(raw[0]),
        sender: NodeId::new(raw[1]),
        next: NodeId::AUTO,
        destination: NodeId::new(raw[2]),
        sensor: raw[6],
        command,
        msg_type: raw[5],
        payload_type: PayloadType::from_bits(raw[4] >> PAYLOAD_TYPE_SHIFT),
        request_ack: raw[4] & REQUEST_ACK_BIT != 0,
        is_ack: raw[4] & IS_ACK_BIT != 0,
        signed: raw[3] & SIGNED_BIT != 0,
        payload: raw[HEADER_SIZE..HEADER_SIZE + declared].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::InternalType;

    fn ping_message() -> Message {
        Message::internal(NodeId::new(7), NodeId::GATEWAY, InternalType::Ping).with_byte(1)
    }

    // -----------------------------------------------------------------------
    // Header bit layout
    // -----------------------------------------------------------------------

    #[test]
    fn test_encode_header_layout() {
        let mut msg = ping_message();
        msg.last = NodeId::new(7);
        let frame = encode(&msg).unwrap();

        assert_eq!(frame.len(), HEADER_SIZE + 1);
        assert_eq!(frame[0], 7); // last
        assert_eq!(frame[1], 7); // sender
        assert_eq!(frame[2], 0); // destination
        // version 2, unsigned, length 1
        assert_eq!(frame[3], 0x02 | (1 << 3));
        // command internal (3), no acks, payload type byte (1)
        assert_eq!(frame[4], 0x03 | (1 << 5));
        assert_eq!(frame[5], InternalType::Ping.byte());
        assert_eq!(frame[6], crate::constants::NODE_SENSOR_ID);
        assert_eq!(frame[7], 1);
    }

    #[test]
    fn test_signed_and_ack_bits() {
        let mut msg = ping_message();
        msg.signed = true;
        msg.request_ack = true;
        msg.is_ack = true;
        let frame = encode(&msg).unwrap();

        assert_eq!(frame[3] & 0x04, 0x04, "signed bit");
        assert_eq!(frame[4] & 0x08, 0x08, "request-ack bit");
        assert_eq!(frame[4] & 0x10, 0x10, "is-ack bit");

        let parsed = parse(&frame).unwrap();
        assert!(parsed.signed);
        assert!(parsed.request_ack);
        assert!(parsed.is_ack);
    }

    #[test]
    fn test_parse_roundtrip() {
        let msg = ping_message();
        let parsed = parse(&encode(&msg).unwrap()).unwrap();
        assert_eq!(parsed.sender, msg.sender);
        assert_eq!(parsed.destination, msg.destination);
        assert_eq!(parsed.command, msg.command);
        assert_eq!(parsed.msg_type, msg.msg_type);
        assert_eq!(parsed.payload, msg.payload);
        // routing metadata is reset on parse
        assert_eq!(parsed.next, NodeId::AUTO);
    }

    // -----------------------------------------------------------------------
    // Rejection paths
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_too_short() {
        let err = parse(&[0u8; 6]).unwrap_err();
        assert_eq!(err, WireError::TooShort { min: 7, actual: 6 });
    }

    #[test]
    fn test_parse_version_mismatch() {
        let mut frame = encode(&ping_message()).unwrap();
        frame[3] = (frame[3] & !0x03) | 0x01; // rewrite version to 1
        let err = parse(&frame).unwrap_err();
        assert_eq!(
            err,
            WireError::VersionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_parse_truncated_payload() {
        let mut frame = encode(&ping_message()).unwrap();
        frame.truncate(HEADER_SIZE); // header claims 1 payload byte
        let err = parse(&frame).unwrap_err();
        assert_eq!(
            err,
            WireError::LengthMismatch {
                declared: 1,
                available: 0
            }
        );
    }

    #[test]
    fn test_parse_ignores_radio_padding() {
        let mut frame = encode(&ping_message()).unwrap();
        frame.extend_from_slice(&[0xFF; 4]);
        let parsed = parse(&frame).unwrap();
        assert_eq!(parsed.payload, vec![1]);
    }

    #[test]
    fn test_encode_payload_too_long() {
        let mut msg = ping_message();
        msg.payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = encode(&msg).unwrap_err();
        assert_eq!(
            err,
            WireError::PayloadTooLong {
                max: MAX_PAYLOAD,
                actual: MAX_PAYLOAD + 1
            }
        );
    }

    #[test]
    fn test_max_payload_roundtrip() {
        let mut msg = ping_message();
        msg.payload = (0..MAX_PAYLOAD as u8).collect();
        msg.payload_type = PayloadType::Custom;
        let parsed = parse(&encode(&msg).unwrap()).unwrap();
        assert_eq!(parsed.payload.len(), MAX_PAYLOAD);
        assert_eq!(parsed.payload_type, PayloadType::Custom);
    }
}
