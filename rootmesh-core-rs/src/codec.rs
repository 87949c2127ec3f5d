//! Wire codec for rootmesh packets
//!
//! Layout (all multi-byte integers big-endian):
//!
//! ```text
//! [source mac: 6][destination mac: 6][tag: 1][payload len: 2][payload]
//! ```
//!
//! `RootInfoResponse` and `RootVote` carry a flat `NodeInfo` payload
//! `[quality: i8][mac: 6]`. `Advertisement` and `RootInfoRequest` carry none.
//! Payloads of unsupported kinds are skipped.

use crate::error::DecodeError;
use crate::types::{MacAddress, NodeInfo, Packet, PacketBody, PacketKind, MAC_LEN};

/// Largest datagram the radio accepts
pub const MAX_FRAME_LEN: usize = 250;

/// Fixed header size
pub const HEADER_LEN: usize = MAC_LEN * 2 + 1 + 2;

/// Encoded size of a `NodeInfo`
pub const NODE_INFO_LEN: usize = 1 + MAC_LEN;

/// Serialize a packet. The radio-level `sender` is not part of the frame.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let payload = match packet.body {
        PacketBody::RootInfoResponse { root } => Some(root),
        PacketBody::RootVote { candidate } => Some(candidate),
        PacketBody::Advertisement
        | PacketBody::RootInfoRequest
        | PacketBody::Unsupported { .. } => None,
    };
    let payload_len = if payload.is_some() { NODE_INFO_LEN } else { 0 };

    let mut buf = Vec::with_capacity(HEADER_LEN + payload_len);
    buf.extend_from_slice(packet.source.as_bytes());
    buf.extend_from_slice(packet.destination.as_bytes());
    buf.push(packet.kind().tag());
    buf.extend_from_slice(&(payload_len as u16).to_be_bytes());
    if let Some(info) = payload {
        buf.push(info.quality as u8);
        buf.extend_from_slice(info.address.as_bytes());
    }
    buf
}

/// Parse a frame delivered by the transport from `sender`
pub fn decode(bytes: &[u8], sender: MacAddress) -> Result<Packet, DecodeError> {
    if bytes.len() > MAX_FRAME_LEN {
        return Err(DecodeError::Oversized(bytes.len()));
    }
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let source = read_mac(&bytes[0..MAC_LEN]);
    let destination = read_mac(&bytes[MAC_LEN..MAC_LEN * 2]);
    let tag = bytes[MAC_LEN * 2];
    let kind = PacketKind::from_tag(tag).ok_or(DecodeError::UnknownVariant(tag))?;
    let declared = u16::from_be_bytes([bytes[MAC_LEN * 2 + 1], bytes[MAC_LEN * 2 + 2]]) as usize;

    let end = HEADER_LEN + declared;
    if bytes.len() < end {
        return Err(DecodeError::Truncated {
            expected: end,
            actual: bytes.len(),
        });
    }
    let payload = &bytes[HEADER_LEN..end];

    let body = match kind {
        PacketKind::Advertisement => {
            expect_len("ADVERTISEMENT", 0, declared)?;
            PacketBody::Advertisement
        }
        PacketKind::RootInfoRequest => {
            expect_len("ROOTNODE_INFO_REQUEST", 0, declared)?;
            PacketBody::RootInfoRequest
        }
        PacketKind::RootInfoResponse => {
            expect_len("ROOTNODE_INFO_RESPONSE", NODE_INFO_LEN, declared)?;
            PacketBody::RootInfoResponse {
                root: read_node_info(payload),
            }
        }
        PacketKind::RootVote => {
            expect_len("ROOT_VOTE", NODE_INFO_LEN, declared)?;
            PacketBody::RootVote {
                candidate: read_node_info(payload),
            }
        }
        PacketKind::Ack | PacketKind::Data | PacketKind::RoutingTable => {
            PacketBody::Unsupported { kind }
        }
    };

    Ok(Packet {
        source,
        destination,
        sender,
        body,
    })
}

fn expect_len(kind: &'static str, expected: usize, declared: usize) -> Result<(), DecodeError> {
    if expected == declared {
        Ok(())
    } else {
        Err(DecodeError::PayloadLength {
            kind,
            expected,
            declared,
        })
    }
}

fn read_mac(bytes: &[u8]) -> MacAddress {
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&bytes[..MAC_LEN]);
    MacAddress(mac)
}

fn read_node_info(payload: &[u8]) -> NodeInfo {
    NodeInfo {
        quality: payload[0] as i8,
        address: read_mac(&payload[1..]),
    }
}
