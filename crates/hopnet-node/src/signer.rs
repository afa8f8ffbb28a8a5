//! HMAC-SHA256 message signer.
//!
//! Frames exchanged with the configured peers carry a 16-byte truncated
//! HMAC-SHA256 tag appended to the payload, keyed by a shared secret. The
//! tag covers every header field that must not be forged; the last-hop
//! byte is excluded because relays rewrite it in flight.

use std::collections::HashSet;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use hopnet_core::constants::MAX_PAYLOAD;
use hopnet_core::{Message, NodeId};
use hopnet_transport::Signer;

type HmacSha256 = Hmac<Sha256>;

/// Length of the truncated tag appended to signed payloads.
pub const TAG_LEN: usize = 16;

/// Signer with a shared secret and a peer allowlist.
#[derive(Debug, Clone)]
pub struct HmacSigner {
    key: Vec<u8>,
    peers: HashSet<NodeId>,
}

impl HmacSigner {
    /// Build a signer from a shared secret and the peers that require
    /// signed traffic.
    pub fn new(secret: &[u8], peers: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            key: secret.to_vec(),
            peers: peers.into_iter().collect(),
        }
    }

    /// The bytes covered by the signature: everything except the mutable
    /// last-hop field and the tag itself.
    fn signable_bytes(message: &Message, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(6 + payload.len());
        data.push(message.sender.raw());
        data.push(message.destination.raw());
        data.push(message.sensor);
        data.push(message.command.bits());
        data.push(message.msg_type);
        data.push(message.payload_type.bits());
        data.extend_from_slice(payload);
        data
    }

    fn tag(&self, message: &Message, payload: &[u8]) -> [u8; TAG_LEN] {
        // SAFETY: HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&Self::signable_bytes(message, payload));
        let full = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&full[..TAG_LEN]);
        tag
    }
}

impl Signer for HmacSigner {
    fn required(&self, peer: NodeId) -> bool {
        self.peers.contains(&peer)
    }

    fn sign(&mut self, message: &mut Message) -> bool {
        if message.payload.len() + TAG_LEN > MAX_PAYLOAD {
            tracing::warn!(
                len = message.payload.len(),
                "payload too long to carry a signature"
            );
            return false;
        }
        let tag = self.tag(message, &message.payload);
        message.payload.extend_from_slice(&tag);
        message.signed = true;
        true
    }

    fn verify(&self, message: &Message) -> bool {
        if message.payload.len() < TAG_LEN {
            return false;
        }
        let split = message.payload.len() - TAG_LEN;
        let (data, tag) = message.payload.split_at(split);

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&Self::signable_bytes(message, data));
        mac.verify_truncated_left(tag).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopnet_core::Command;

    fn signer() -> HmacSigner {
        HmacSigner::new(b"shared secret", [NodeId::GATEWAY])
    }

    fn message() -> Message {
        Message::new(NodeId::new(7), NodeId::GATEWAY, 1, Command::Set, 0).with_byte(42)
    }

    #[test]
    fn test_required_only_for_listed_peers() {
        let signer = signer();
        assert!(signer.required(NodeId::GATEWAY));
        assert!(!signer.required(NodeId::new(9)));
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let mut signer = signer();
        let mut msg = message();
        assert!(signer.sign(&mut msg));
        assert!(msg.signed);
        assert_eq!(msg.payload.len(), 1 + TAG_LEN);
        assert!(signer.verify(&msg));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let mut signer = signer();
        let mut msg = message();
        signer.sign(&mut msg);
        msg.payload[0] ^= 0xFF;
        assert!(!signer.verify(&msg));
    }

    #[test]
    fn test_tampered_sender_fails_verification() {
        let mut signer = signer();
        let mut msg = message();
        signer.sign(&mut msg);
        msg.sender = NodeId::new(8);
        assert!(!signer.verify(&msg));
    }

    #[test]
    fn test_rewritten_last_hop_still_verifies() {
        // Relays rewrite the last-hop byte; the tag must not cover it.
        let mut signer = signer();
        let mut msg = message();
        signer.sign(&mut msg);
        msg.last = NodeId::new(3);
        assert!(signer.verify(&msg));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let mut signer = signer();
        let mut msg = message();
        signer.sign(&mut msg);

        let other = HmacSigner::new(b"different secret", [NodeId::GATEWAY]);
        assert!(!other.verify(&msg));
    }

    #[test]
    fn test_full_payload_cannot_be_signed() {
        let mut signer = signer();
        let mut msg = message();
        msg.payload = vec![0u8; MAX_PAYLOAD];
        assert!(!signer.sign(&mut msg));
        assert!(!msg.signed);
    }

    #[test]
    fn test_short_payload_fails_verification() {
        let signer = signer();
        let mut msg = message();
        msg.signed = true; // flag set but no tag present
        assert!(!signer.verify(&msg));
    }
}
