//! Root discovery
//!
//! A node that joins a settled mesh learns the root by asking. Only when
//! nobody answers within the retry budget does it fall back to an election.

use crate::election::spawn_election;
use crate::node::MeshContext;
use crate::state::{ElectionStart, ResponseOutcome};
use crate::types::{NodeInfo, Packet, PacketBody};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Broadcast root info requests until a root is known or an election starts,
/// then elect if neither happened.
pub async fn search_rootnode(ctx: Arc<MeshContext>) {
    let retries = ctx.config.search_retries;

    for attempt in 1..=retries {
        let should_search = ctx.state.lock().should_search();
        if !should_search {
            debug!("Discovery: Root settled or election running, search stopped");
            return;
        }

        if ctx.broadcast(PacketBody::RootInfoRequest) {
            info!("Discovery: Root info request sent ({}/{})", attempt, retries);
        }
        sleep(ctx.config.interval).await;
    }

    let start = ctx.state.lock().begin_election();
    match start {
        ElectionStart::Started => {
            warn!("Discovery: Root node not found, starting election");
            spawn_election(&ctx);
        }
        ElectionStart::AlreadyVoting => {
            debug!("Discovery: Election already running");
        }
        ElectionStart::AlreadyResolved => {
            debug!("Discovery: Root settled during the last wait");
        }
    }
}

/// Answer a neighbor asking for the root, if we know it
pub fn handle_request(ctx: &MeshContext, packet: &Packet) {
    info!("Discovery: Root info request from {}", packet.sender);

    let root = ctx.state.lock().on_root_info_request();
    match root {
        Some(root) => {
            if ctx.send(packet.sender, PacketBody::RootInfoResponse { root }) {
                info!("Discovery: Root info {} sent to {}", root, packet.sender);
            }
        }
        None => debug!("Discovery: No root yet, request from {} ignored", packet.sender),
    }
}

pub fn handle_response(ctx: &MeshContext, packet: &Packet, root: NodeInfo) {
    info!("Discovery: Root info received from {}: {}", packet.sender, root);

    let outcome = ctx.state.lock().on_root_info_response(root);
    match outcome {
        ResponseOutcome::Adopted { during_vote: true } => {
            warn!("Discovery: Root {} adopted while an election is running", root);
        }
        ResponseOutcome::Adopted { during_vote: false } | ResponseOutcome::Confirmed => {}
        ResponseOutcome::Conflict { current, claimed } => {
            error!(
                "Discovery: Root conflict reported by {}: keeping {}, ignoring {}",
                packet.sender, current, claimed
            );
        }
    }
}
