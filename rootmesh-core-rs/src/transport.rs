//! Transport adapter contract
//!
//! The radio is an external collaborator. It offers non-blocking unicast and
//! broadcast sends to registered peers, reports send completion
//! asynchronously, and delivers inbound frames from its own context. The
//! delivery hook only copies the frame into the bounded inbound queue; all
//! decoding happens on the dispatch loop.

use crate::error::TransportError;
use crate::types::MacAddress;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Radio primitives a node needs
pub trait Transport: Send + Sync {
    /// Hardware address of this radio
    fn local_address(&self) -> MacAddress;

    /// Install the delivery and send-completion hooks
    fn register_callbacks(&self, callbacks: Callbacks) -> Result<(), TransportError>;

    /// Add `addr` to the radio's peer table
    fn register_peer(&self, addr: MacAddress) -> Result<(), TransportError>;

    /// Whether `addr` is in the radio's peer table
    fn peer_exists(&self, addr: MacAddress) -> bool;

    /// Queue a frame for `dst`, which must be a registered peer.
    /// Completion is reported later through [`Callbacks::on_send_complete`].
    fn send(&self, dst: MacAddress, data: &[u8]) -> Result<(), TransportError>;
}

/// Outcome of a send, reported asynchronously by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Success,
    Fail,
}

/// Raw frame copied out of the radio's delivery context
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub sender: MacAddress,
    pub data: Vec<u8>,
}

/// Hooks a transport invokes from its own context
#[derive(Clone)]
pub struct Callbacks {
    inbound: mpsc::Sender<InboundFrame>,
    enqueue_timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl Callbacks {
    pub fn new(inbound: mpsc::Sender<InboundFrame>, enqueue_timeout: Duration) -> Self {
        Self {
            inbound,
            enqueue_timeout,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Copy a delivered frame into the inbound queue.
    ///
    /// Waits at most the configured enqueue timeout for a free slot, then
    /// drops the frame. Returns whether the frame was queued.
    pub async fn on_receive(&self, sender: MacAddress, data: &[u8]) -> bool {
        if data.is_empty() {
            error!("Transport: empty frame from {}", sender);
            return false;
        }

        let frame = InboundFrame {
            sender,
            data: data.to_vec(),
        };

        match timeout(self.enqueue_timeout, self.inbound.send(frame)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!("Transport: dispatch loop stopped, discarding frame from {}", sender);
                false
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Transport: inbound queue full, dropped frame from {}", sender);
                false
            }
        }
    }

    /// Zero-wait variant of [`Callbacks::on_receive`] for drivers that
    /// deliver from a non-async context
    pub fn try_on_receive(&self, sender: MacAddress, data: &[u8]) -> bool {
        if data.is_empty() {
            error!("Transport: empty frame from {}", sender);
            return false;
        }

        let frame = InboundFrame {
            sender,
            data: data.to_vec(),
        };

        match self.inbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Transport: inbound queue full, dropped frame from {}", sender);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Log a send completion. Failed sends are never retried here; the
    /// protocol's periodic rebroadcasts cover losses.
    pub fn on_send_complete(&self, dst: MacAddress, status: SendStatus) {
        match status {
            SendStatus::Success => debug!("Transport: sent to {}", dst),
            SendStatus::Fail => error!("Transport: send to {} failed", dst),
        }
    }

    /// Frames dropped because the inbound queue stayed full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: MacAddress = MacAddress([2, 0, 0, 0, 0, 9]);

    #[tokio::test(start_paused = true)]
    async fn test_receive_drops_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let callbacks = Callbacks::new(tx, Duration::from_millis(512));

        assert!(callbacks.on_receive(PEER, &[1, 2, 3]).await);
        assert!(!callbacks.on_receive(PEER, &[4, 5, 6]).await);
        assert_eq!(callbacks.dropped_frames(), 1);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.sender, PEER);
        assert_eq!(frame.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_receive_waits_for_free_slot() {
        let (tx, mut rx) = mpsc::channel(1);
        let callbacks = Callbacks::new(tx, Duration::from_secs(5));
        assert!(callbacks.on_receive(PEER, &[1]).await);

        let consumer = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            (first.data, second.data)
        });

        assert!(callbacks.on_receive(PEER, &[2]).await);
        let (first, second) = consumer.await.unwrap();
        assert_eq!(first, vec![1]);
        assert_eq!(second, vec![2]);
        assert_eq!(callbacks.dropped_frames(), 0);
    }

    #[tokio::test]
    async fn test_try_receive_and_empty_frames() {
        let (tx, _rx) = mpsc::channel(1);
        let callbacks = Callbacks::new(tx, Duration::from_millis(10));

        assert!(!callbacks.try_on_receive(PEER, &[]));
        assert!(callbacks.try_on_receive(PEER, &[7]));
        assert!(!callbacks.try_on_receive(PEER, &[8]));
        assert_eq!(callbacks.dropped_frames(), 1);
    }
}
