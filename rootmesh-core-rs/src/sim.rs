//! In-memory radio medium
//!
//! Every attached radio hears every broadcast of every other radio, unicast
//! reaches only the addressed one, and each radio keeps its own peer table
//! with the same rules as the real driver. Deliveries run as separate tasks,
//! so frames can arrive out of order. Links can be cut and frames dropped at
//! random to exercise the protocol under loss.

use crate::codec::MAX_FRAME_LEN;
use crate::error::TransportError;
use crate::transport::{Callbacks, SendStatus, Transport};
use crate::types::MacAddress;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Peer table size of the reference radio
pub const MAX_PEERS: usize = 20;

/// A frame handed to the medium
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub from: MacAddress,
    pub to: MacAddress,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct Station {
    callbacks: Option<Callbacks>,
    peers: HashSet<MacAddress>,
}

#[derive(Default)]
struct MediumInner {
    stations: HashMap<MacAddress, Station>,
    cut: HashSet<(MacAddress, MacAddress)>,
    loss: f64,
    log: Vec<SentFrame>,
}

impl MediumInner {
    fn linked(&self, a: MacAddress, b: MacAddress) -> bool {
        !self.cut.contains(&ordered(a, b))
    }
}

fn ordered(a: MacAddress, b: MacAddress) -> (MacAddress, MacAddress) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Shared broadcast medium
#[derive(Clone, Default)]
pub struct SimMedium {
    inner: Arc<Mutex<MediumInner>>,
}

impl SimMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium that drops each delivery with probability `loss`
    pub fn with_loss(loss: f64) -> Self {
        let medium = Self::new();
        medium.set_loss(loss);
        medium
    }

    pub fn set_loss(&self, loss: f64) {
        self.inner.lock().loss = loss.clamp(0.0, 1.0);
    }

    /// Add a radio with hardware address `address`
    pub fn attach(&self, address: MacAddress) -> Arc<SimRadio> {
        self.inner.lock().stations.entry(address).or_default();
        Arc::new(SimRadio {
            address,
            medium: self.inner.clone(),
        })
    }

    /// Stop all traffic between `a` and `b`
    pub fn cut(&self, a: MacAddress, b: MacAddress) {
        self.inner.lock().cut.insert(ordered(a, b));
    }

    pub fn heal(&self, a: MacAddress, b: MacAddress) {
        self.inner.lock().cut.remove(&ordered(a, b));
    }

    pub fn heal_all(&self) {
        self.inner.lock().cut.clear();
    }

    /// Every frame accepted for sending so far
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.inner.lock().log.clone()
    }
}

/// One radio on a [`SimMedium`]
pub struct SimRadio {
    address: MacAddress,
    medium: Arc<Mutex<MediumInner>>,
}

impl Transport for SimRadio {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn register_callbacks(&self, callbacks: Callbacks) -> Result<(), TransportError> {
        let mut medium = self.medium.lock();
        let station = medium.stations.entry(self.address).or_default();
        station.callbacks = Some(callbacks);
        Ok(())
    }

    fn register_peer(&self, addr: MacAddress) -> Result<(), TransportError> {
        let mut medium = self.medium.lock();
        let station = medium.stations.entry(self.address).or_default();
        if station.peers.contains(&addr) {
            return Err(TransportError::PeerExists(addr));
        }
        if station.peers.len() >= MAX_PEERS {
            return Err(TransportError::PeerTableFull);
        }
        station.peers.insert(addr);
        Ok(())
    }

    fn peer_exists(&self, addr: MacAddress) -> bool {
        self.medium
            .lock()
            .stations
            .get(&self.address)
            .map(|s| s.peers.contains(&addr))
            .unwrap_or(false)
    }

    fn send(&self, dst: MacAddress, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::PayloadTooLarge(data.len()));
        }
        let runtime = Handle::try_current().map_err(|_| TransportError::NotStarted)?;

        let mut medium = self.medium.lock();
        let own = medium
            .stations
            .get(&self.address)
            .ok_or(TransportError::NotStarted)?;
        if !own.peers.contains(&dst) {
            return Err(TransportError::PeerNotFound(dst));
        }
        let own_callbacks = own.callbacks.clone();

        let targets: Vec<MacAddress> = if dst.is_broadcast() {
            medium
                .stations
                .keys()
                .filter(|addr| **addr != self.address)
                .copied()
                .collect()
        } else {
            vec![dst]
        };

        let mut rng = rand::thread_rng();
        let mut delivered = false;
        for target in targets {
            if !medium.linked(self.address, target) {
                continue;
            }
            if medium.loss > 0.0 && rng.gen_bool(medium.loss) {
                debug!("Sim: Lost frame {} -> {}", self.address, target);
                continue;
            }
            let Some(callbacks) = medium.stations.get(&target).and_then(|s| s.callbacks.clone()) else {
                continue;
            };

            delivered = true;
            let src = self.address;
            let frame = data.to_vec();
            runtime.spawn(async move {
                callbacks.on_receive(src, &frame).await;
            });
        }

        medium.log.push(SentFrame {
            from: self.address,
            to: dst,
            data: data.to_vec(),
        });
        drop(medium);

        if let Some(callbacks) = own_callbacks {
            // The reference radio reports broadcasts as sent regardless of listeners
            let status = if delivered || dst.is_broadcast() {
                SendStatus::Success
            } else {
                SendStatus::Fail
            };
            runtime.spawn(async move {
                callbacks.on_send_complete(dst, status);
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InboundFrame;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const A: MacAddress = MacAddress([2, 0, 0, 0, 0, 1]);
    const B: MacAddress = MacAddress([2, 0, 0, 0, 0, 2]);
    const C: MacAddress = MacAddress([2, 0, 0, 0, 0, 3]);

    fn listen(radio: &SimRadio) -> mpsc::Receiver<InboundFrame> {
        let (tx, rx) = mpsc::channel(16);
        radio
            .register_callbacks(Callbacks::new(tx, Duration::from_millis(100)))
            .unwrap();
        rx
    }

    #[tokio::test]
    async fn test_unicast_requires_peer() {
        let medium = SimMedium::new();
        let a = medium.attach(A);
        let b = medium.attach(B);
        let mut rx_b = listen(&b);

        assert!(matches!(a.send(B, &[1]), Err(TransportError::PeerNotFound(_))));

        a.register_peer(B).unwrap();
        a.send(B, &[1]).unwrap();
        let frame = rx_b.recv().await.unwrap();
        assert_eq!(frame.sender, A);
        assert_eq!(frame.data, vec![1]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_but_sender() {
        let medium = SimMedium::new();
        let a = medium.attach(A);
        let b = medium.attach(B);
        let c = medium.attach(C);
        let mut rx_a = listen(&a);
        let mut rx_b = listen(&b);
        let mut rx_c = listen(&c);

        a.register_peer(MacAddress::BROADCAST).unwrap();
        a.send(MacAddress::BROADCAST, &[9]).unwrap();

        assert_eq!(rx_b.recv().await.unwrap().data, vec![9]);
        assert_eq!(rx_c.recv().await.unwrap().data, vec![9]);
        tokio::task::yield_now().await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cut_link_drops_frames() {
        let medium = SimMedium::new();
        let a = medium.attach(A);
        let b = medium.attach(B);
        let mut rx_b = listen(&b);
        a.register_peer(B).unwrap();

        medium.cut(B, A);
        a.send(B, &[1]).unwrap();
        medium.heal(A, B);
        a.send(B, &[2]).unwrap();

        assert_eq!(rx_b.recv().await.unwrap().data, vec![2]);
        assert_eq!(medium.sent_frames().len(), 2);
    }

    #[tokio::test]
    async fn test_total_loss() {
        let medium = SimMedium::with_loss(1.0);
        let a = medium.attach(A);
        let b = medium.attach(B);
        let mut rx_b = listen(&b);
        a.register_peer(B).unwrap();

        a.send(B, &[1]).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_peer_table_limits() {
        let medium = SimMedium::new();
        let a = medium.attach(A);

        a.register_peer(B).unwrap();
        assert!(matches!(a.register_peer(B), Err(TransportError::PeerExists(_))));

        for i in 0..(MAX_PEERS - 1) {
            a.register_peer(MacAddress([4, 0, 0, 0, 0, i as u8])).unwrap();
        }
        assert!(matches!(
            a.register_peer(MacAddress([5; 6])),
            Err(TransportError::PeerTableFull)
        ));
    }

    #[test]
    fn test_send_outside_runtime_fails() {
        let medium = SimMedium::new();
        let a = medium.attach(A);
        a.register_peer(B).unwrap();
        assert!(matches!(a.send(B, &[1]), Err(TransportError::NotStarted)));
    }
}
