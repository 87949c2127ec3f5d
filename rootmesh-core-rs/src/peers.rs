//! Peer registry
//!
//! Mirrors the radio's peer table. A frame from an unknown sender registers
//! it with the radio so it can be unicast to; the dispatch loop then
//! advertises back so the remote side registers us too. Peers are never
//! expired.

use crate::error::TransportError;
use crate::transport::Transport;
use crate::types::MacAddress;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Bookkeeping for one known peer
#[derive(Debug, Clone, Copy)]
pub struct PeerEntry {
    pub address: MacAddress,
    pub first_seen: Instant,
    pub last_seen: Instant,
    /// Frames received from this peer
    pub packets: u64,
}

/// Known transport peers
pub struct PeerRegistry {
    transport: Arc<dyn Transport>,
    peers: Mutex<HashMap<MacAddress, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure `address` is a registered transport peer.
    ///
    /// Returns `Ok(true)` when the address was not registered before this
    /// call. The caller owes the new peer an advertisement.
    pub fn ensure_peer(&self, address: MacAddress) -> Result<bool, TransportError> {
        let now = Instant::now();
        let newly_seen = if self.transport.peer_exists(address) {
            false
        } else {
            match self.transport.register_peer(address) {
                Ok(()) => true,
                // Lost a race with another registration of the same address
                Err(TransportError::PeerExists(_)) => false,
                Err(e) => return Err(e),
            }
        };

        let mut peers = self.peers.lock();
        let entry = peers.entry(address).or_insert_with(|| PeerEntry {
            address,
            first_seen: now,
            last_seen: now,
            packets: 0,
        });
        entry.last_seen = now;

        if newly_seen {
            info!("Peers: Added peer {}", address);
        } else {
            debug!("Peers: {} already registered", address);
        }
        Ok(newly_seen)
    }

    /// Record an inbound frame from `address`
    pub fn touch(&self, address: MacAddress) {
        if let Some(entry) = self.peers.lock().get_mut(&address) {
            entry.last_seen = Instant::now();
            entry.packets += 1;
        }
    }

    pub fn contains(&self, address: MacAddress) -> bool {
        self.transport.peer_exists(address)
    }

    /// Known unicast peers (the broadcast address excluded)
    pub fn snapshot(&self) -> Vec<PeerEntry> {
        let mut peers: Vec<PeerEntry> = self
            .peers
            .lock()
            .values()
            .filter(|p| !p.address.is_broadcast())
            .copied()
            .collect();
        peers.sort_by_key(|p| p.address);
        peers
    }

    pub fn len(&self) -> usize {
        self.peers
            .lock()
            .keys()
            .filter(|addr| !addr.is_broadcast())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMedium;

    const LOCAL: MacAddress = MacAddress([2, 0, 0, 0, 0, 1]);
    const REMOTE: MacAddress = MacAddress([2, 0, 0, 0, 0, 2]);

    #[tokio::test]
    async fn test_ensure_peer_registers_once() {
        let medium = SimMedium::new();
        let radio = medium.attach(LOCAL);
        let registry = PeerRegistry::new(radio.clone());

        assert!(registry.ensure_peer(REMOTE).unwrap());
        assert!(radio.peer_exists(REMOTE));
        assert!(!registry.ensure_peer(REMOTE).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_not_counted() {
        let medium = SimMedium::new();
        let registry = PeerRegistry::new(medium.attach(LOCAL));

        assert!(registry.ensure_peer(MacAddress::BROADCAST).unwrap());
        assert!(registry.is_empty());
        assert!(registry.contains(MacAddress::BROADCAST));
    }

    #[tokio::test]
    async fn test_touch_counts_packets() {
        let medium = SimMedium::new();
        let registry = PeerRegistry::new(medium.attach(LOCAL));

        registry.ensure_peer(REMOTE).unwrap();
        registry.touch(REMOTE);
        registry.touch(REMOTE);

        let peers = registry.snapshot();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].packets, 2);
    }
}
