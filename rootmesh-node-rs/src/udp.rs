//! Datagram radio emulated over UDP
//!
//! Each datagram carries a link header `[src mac][dst mac]` in front of the
//! rootmesh frame and is sent to every fan-out address (by default the IPv4
//! broadcast address on the node port). Receivers keep frames addressed to
//! them or to the broadcast address, which is what the radio would deliver.

use parking_lot::Mutex;
use rootmesh_core::codec::MAX_FRAME_LEN;
use rootmesh_core::{Callbacks, MacAddress, SendStatus, Transport, TransportError, MAC_LEN};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Default UDP port for emulated radio traffic
pub const DEFAULT_PORT: u16 = 9990;

/// Peer table size of the reference radio
const MAX_PEERS: usize = 20;

const LINK_HEADER_LEN: usize = MAC_LEN * 2;

pub struct UdpRadio {
    address: MacAddress,
    socket: Arc<UdpSocket>,
    fanout: Vec<SocketAddr>,
    peers: Mutex<HashSet<MacAddress>>,
    callbacks: Mutex<Option<Callbacks>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl UdpRadio {
    /// Bind `0.0.0.0:port`. An empty `fanout` means the broadcast address.
    pub async fn bind(
        address: MacAddress,
        port: u16,
        fanout: Vec<SocketAddr>,
    ) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).await?;
        socket.set_broadcast(true)?;

        let fanout = if fanout.is_empty() {
            vec![SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, port))]
        } else {
            fanout
        };

        Ok(Self {
            address,
            socket: Arc::new(socket),
            fanout,
            peers: Mutex::new(HashSet::new()),
            callbacks: Mutex::new(None),
            receiver: Mutex::new(None),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    fn receive_loop(&self, callbacks: Callbacks) -> impl std::future::Future<Output = ()> {
        let socket = self.socket.clone();
        let me = self.address;

        async move {
            let mut buf = vec![0u8; LINK_HEADER_LEN + MAX_FRAME_LEN + 1];
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("UDP receive error: {}", e);
                        continue;
                    }
                };

                let Some((src, dst, payload)) = split_link_header(&buf[..len]) else {
                    warn!("Dropping {} byte datagram without link header from {}", len, from);
                    continue;
                };
                if src == me || !(dst == me || dst.is_broadcast()) {
                    continue;
                }

                debug!("Received {} bytes from {} ({})", payload.len(), src, from);
                callbacks.on_receive(src, payload).await;
            }
        }
    }
}

fn split_link_header(datagram: &[u8]) -> Option<(MacAddress, MacAddress, &[u8])> {
    if datagram.len() <= LINK_HEADER_LEN {
        return None;
    }
    let mut src = [0u8; MAC_LEN];
    let mut dst = [0u8; MAC_LEN];
    src.copy_from_slice(&datagram[..MAC_LEN]);
    dst.copy_from_slice(&datagram[MAC_LEN..LINK_HEADER_LEN]);
    Some((MacAddress(src), MacAddress(dst), &datagram[LINK_HEADER_LEN..]))
}

impl Transport for UdpRadio {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn register_callbacks(&self, callbacks: Callbacks) -> Result<(), TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NotStarted)?;
        let task = runtime.spawn(self.receive_loop(callbacks.clone()));
        if let Some(previous) = self.receiver.lock().replace(task) {
            previous.abort();
        }
        *self.callbacks.lock() = Some(callbacks);
        Ok(())
    }

    fn register_peer(&self, addr: MacAddress) -> Result<(), TransportError> {
        let mut peers = self.peers.lock();
        if peers.contains(&addr) {
            return Err(TransportError::PeerExists(addr));
        }
        if peers.len() >= MAX_PEERS {
            return Err(TransportError::PeerTableFull);
        }
        peers.insert(addr);
        Ok(())
    }

    fn peer_exists(&self, addr: MacAddress) -> bool {
        self.peers.lock().contains(&addr)
    }

    fn send(&self, dst: MacAddress, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_FRAME_LEN {
            return Err(TransportError::PayloadTooLarge(data.len()));
        }
        if !self.peer_exists(dst) {
            return Err(TransportError::PeerNotFound(dst));
        }

        let runtime = Handle::try_current().map_err(|_| TransportError::NotStarted)?;

        let mut datagram = Vec::with_capacity(LINK_HEADER_LEN + data.len());
        datagram.extend_from_slice(self.address.as_bytes());
        datagram.extend_from_slice(dst.as_bytes());
        datagram.extend_from_slice(data);

        let socket = self.socket.clone();
        let fanout = self.fanout.clone();
        let callbacks = self.callbacks.lock().clone();
        runtime.spawn(async move {
            let mut status = SendStatus::Success;
            for addr in fanout {
                if let Err(e) = socket.send_to(&datagram, addr).await {
                    warn!("UDP send to {} failed: {}", addr, e);
                    status = SendStatus::Fail;
                }
            }
            if let Some(callbacks) = callbacks {
                callbacks.on_send_complete(dst, status);
            }
        });
        Ok(())
    }
}

impl Drop for UdpRadio {
    fn drop(&mut self) {
        if let Some(task) = self.receiver.lock().take() {
            task.abort();
        }
    }
}
