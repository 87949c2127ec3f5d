//! Node bootstrap and shared context
//!
//! `Node::start` wires the transport to the inbound queue and spawns the
//! dispatch loop, the advertisement task and the root search. The election
//! task is spawned on demand by discovery or by the dispatch loop.

use crate::advertise::run_advertise_loop;
use crate::codec;
use crate::config::MeshConfig;
use crate::discovery::search_rootnode;
use crate::dispatch::run_dispatch_loop;
use crate::error::MeshError;
use crate::peers::PeerRegistry;
use crate::quality::QualitySource;
use crate::state::RootState;
use crate::transport::{Callbacks, Transport};
use crate::types::{MacAddress, NodeInfo, Packet, PacketBody};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// State and collaborators shared by a node's tasks
pub struct MeshContext {
    pub config: MeshConfig,
    pub this_node: NodeInfo,
    pub transport: Arc<dyn Transport>,
    pub peers: PeerRegistry,
    pub state: Mutex<RootState>,
    pub(crate) election_task: Mutex<Option<JoinHandle<()>>>,
}

impl MeshContext {
    pub fn new(config: MeshConfig, this_node: NodeInfo, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            this_node,
            peers: PeerRegistry::new(transport.clone()),
            transport,
            state: Mutex::new(RootState::new(this_node)),
            election_task: Mutex::new(None),
        }
    }

    /// Encode and hand a packet to the radio. Failures are logged and
    /// reported as `false`; nothing is retried.
    pub fn send(&self, dst: MacAddress, body: PacketBody) -> bool {
        let packet = Packet::new(self.this_node.address, dst, body);
        let bytes = codec::encode(&packet);

        match self.transport.send(dst, &bytes) {
            Ok(()) => {
                debug!("Sent {} to {}", packet.kind(), dst);
                true
            }
            Err(e) => {
                warn!("Failed to send {} to {}: {}", packet.kind(), dst, e);
                false
            }
        }
    }

    pub fn broadcast(&self, body: PacketBody) -> bool {
        self.send(MacAddress::BROADCAST, body)
    }
}

/// Point-in-time view of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub this_node: NodeInfo,
    pub root_node: NodeInfo,
    pub is_root_defined: bool,
    pub is_voting: bool,
    pub peers: Vec<MacAddress>,
    pub root_conflicts: u64,
    pub dropped_frames: u64,
}

impl NodeStatus {
    /// Root known and no election in flight
    pub fn is_settled(&self) -> bool {
        self.is_root_defined && !self.is_voting
    }
}

/// A running rootmesh node
pub struct Node {
    ctx: Arc<MeshContext>,
    callbacks: Callbacks,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Start coordinating over `transport`.
    ///
    /// Must be called from within a tokio runtime. Fails only when the
    /// configuration is invalid or the radio refuses the broadcast peer or
    /// the callbacks; every later error is logged and survived.
    pub fn start(
        config: MeshConfig,
        transport: Arc<dyn Transport>,
        quality: &dyn QualitySource,
    ) -> Result<Self, MeshError> {
        config.validate()?;

        let this_node = NodeInfo::new(transport.local_address(), quality.measure_local_quality());
        let ctx = Arc::new(MeshContext::new(config, this_node, transport.clone()));

        ctx.peers.ensure_peer(MacAddress::BROADCAST)?;

        let (inbound_tx, inbound_rx) = mpsc::channel(ctx.config.queue_capacity);
        let callbacks = Callbacks::new(inbound_tx, ctx.config.enqueue_timeout);
        transport.register_callbacks(callbacks.clone())?;

        info!("This node: {}", this_node);

        let tasks = vec![
            tokio::spawn(run_dispatch_loop(ctx.clone(), inbound_rx)),
            tokio::spawn(run_advertise_loop(ctx.clone())),
            tokio::spawn(search_rootnode(ctx.clone())),
        ];

        Ok(Self {
            ctx,
            callbacks,
            tasks,
        })
    }

    pub fn this_node(&self) -> NodeInfo {
        self.ctx.this_node
    }

    pub fn config(&self) -> &MeshConfig {
        &self.ctx.config
    }

    pub fn status(&self) -> NodeStatus {
        let state = self.ctx.state.lock().clone();
        NodeStatus {
            this_node: state.this_node(),
            root_node: state.root_node(),
            is_root_defined: state.is_root_defined(),
            is_voting: state.is_voting(),
            peers: self.ctx.peers.snapshot().iter().map(|p| p.address).collect(),
            root_conflicts: state.root_conflicts(),
            dropped_frames: self.callbacks.dropped_frames(),
        }
    }

    /// Poll until the root is settled or `limit` elapses
    pub async fn wait_settled(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        let step = (self.ctx.config.interval / 10).max(Duration::from_millis(1));

        loop {
            if self.status().is_settled() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(step).await;
        }
    }

    /// Abort every task of this node, including a running election
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(task) = self.ctx.election_task.lock().take() {
            task.abort();
        }
    }
}
