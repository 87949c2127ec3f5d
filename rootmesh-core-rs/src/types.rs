//! Core types for the rootmesh protocol

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a radio hardware address
pub const MAC_LEN: usize = 6;

/// Quality reported when the reference access point cannot be found
pub const NO_SIGNAL: i8 = i8::MIN;

/// Radio hardware address of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MacAddress(pub [u8; MAC_LEN]);

impl MacAddress {
    /// Link-layer broadcast address
    pub const BROADCAST: MacAddress = MacAddress([0xff; MAC_LEN]);

    pub const fn new(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Error parsing a textual MAC address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {0:?}")]
pub struct ParseMacError(pub String);

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != MAC_LEN {
            return Err(ParseMacError(s.to_string()));
        }

        let mut bytes = [0u8; MAC_LEN];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseMacError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseMacError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A node and its last known local signal quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub quality: i8,
    pub address: MacAddress,
}

impl NodeInfo {
    pub fn new(address: MacAddress, quality: i8) -> Self {
        Self { quality, address }
    }

    /// Strictly better candidate than `other`. Equal quality never outranks,
    /// so the candidate seen first is kept.
    pub fn outranks(&self, other: &NodeInfo) -> bool {
        self.quality > other.quality
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (quality {})", self.address, self.quality)
    }
}

/// Wire tag of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Delivery acknowledgement (declared, not handled)
    Ack = 0,
    /// Application payload (declared, not handled)
    Data = 1,
    /// Election ballot
    RootVote = 2,
    /// Presence announcement
    Advertisement = 3,
    /// Routing table exchange (declared, not handled)
    RoutingTable = 4,
    /// "Who is the root?"
    RootInfoRequest = 5,
    /// Answer carrying the settled root
    RootInfoResponse = 6,
}

impl PacketKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PacketKind::Ack),
            1 => Some(PacketKind::Data),
            2 => Some(PacketKind::RootVote),
            3 => Some(PacketKind::Advertisement),
            4 => Some(PacketKind::RoutingTable),
            5 => Some(PacketKind::RootInfoRequest),
            6 => Some(PacketKind::RootInfoResponse),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Whether this core handles the kind
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            PacketKind::Ack | PacketKind::Data | PacketKind::RoutingTable
        )
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Ack => "ACK",
            PacketKind::Data => "DATA",
            PacketKind::RootVote => "ROOT_VOTE",
            PacketKind::Advertisement => "ADVERTISEMENT",
            PacketKind::RoutingTable => "ROUTING_TABLE",
            PacketKind::RootInfoRequest => "ROOTNODE_INFO_REQUEST",
            PacketKind::RootInfoResponse => "ROOTNODE_INFO_RESPONSE",
        };
        f.write_str(name)
    }
}

/// Variant-specific part of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketBody {
    /// Liveness/presence announcement
    Advertisement,
    /// Ask neighbors for the settled root
    RootInfoRequest,
    /// Settled root, sent in reply to a request
    RootInfoResponse { root: NodeInfo },
    /// Sender's current best candidate during an election
    RootVote { candidate: NodeInfo },
    /// A declared kind this core does not implement; payload discarded
    Unsupported { kind: PacketKind },
}

impl PacketBody {
    pub fn kind(&self) -> PacketKind {
        match self {
            PacketBody::Advertisement => PacketKind::Advertisement,
            PacketBody::RootInfoRequest => PacketKind::RootInfoRequest,
            PacketBody::RootInfoResponse { .. } => PacketKind::RootInfoResponse,
            PacketBody::RootVote { .. } => PacketKind::RootVote,
            PacketBody::Unsupported { kind } => *kind,
        }
    }
}

/// A protocol packet
///
/// `source` and `destination` travel on the wire. `sender` is the radio-level
/// sender reported by the transport on delivery and is never encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub source: MacAddress,
    pub destination: MacAddress,
    pub sender: MacAddress,
    pub body: PacketBody,
}

impl Packet {
    /// Build an outbound packet originating at `source`
    pub fn new(source: MacAddress, destination: MacAddress, body: PacketBody) -> Self {
        Self {
            source,
            destination,
            sender: source,
            body,
        }
    }

    pub fn kind(&self) -> PacketKind {
        self.body.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_and_parse() {
        let mac = MacAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff]);
        assert_eq!(mac.to_string(), "24:0a:c4:00:01:ff");
        assert_eq!("24:0a:c4:00:01:ff".parse::<MacAddress>().unwrap(), mac);
        assert_eq!("24-0A-C4-00-01-FF".parse::<MacAddress>().unwrap(), mac);
    }

    #[test]
    fn test_mac_parse_rejects_garbage() {
        assert!("24:0a:c4:00:01".parse::<MacAddress>().is_err());
        assert!("24:0a:c4:00:01:zz".parse::<MacAddress>().is_err());
        assert!("240:a:c4:00:01:ff".parse::<MacAddress>().is_err());
        assert!("24:0a:c4:00:01:+f".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_serializes_as_string() {
        let json = serde_json::to_string(&MacAddress::BROADCAST).unwrap();
        assert_eq!(json, "\"ff:ff:ff:ff:ff:ff\"");
        let back: MacAddress = serde_json::from_str(&json).unwrap();
        assert!(back.is_broadcast());
    }

    #[test]
    fn test_outranks_is_strict() {
        let a = NodeInfo::new(MacAddress::new([1; 6]), -40);
        let b = NodeInfo::new(MacAddress::new([2; 6]), -40);
        let c = NodeInfo::new(MacAddress::new([3; 6]), -30);

        assert!(!a.outranks(&b));
        assert!(!b.outranks(&a));
        assert!(c.outranks(&a));
        assert!(!a.outranks(&c));
    }

    #[test]
    fn test_packet_kind_tags() {
        for tag in 0..=6u8 {
            let kind = PacketKind::from_tag(tag).unwrap();
            assert_eq!(kind.tag(), tag);
        }
        assert!(PacketKind::from_tag(7).is_none());
        assert!(!PacketKind::Data.is_supported());
        assert!(PacketKind::RootVote.is_supported());
    }
}
