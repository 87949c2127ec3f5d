//! Dispatch loop
//!
//! The single consumer of the inbound queue. Frames are handled one at a
//! time: decode, register the sender, then route by packet kind.

use crate::codec;
use crate::discovery;
use crate::election;
use crate::node::MeshContext;
use crate::transport::InboundFrame;
use crate::types::PacketBody;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub async fn run_dispatch_loop(ctx: Arc<MeshContext>, mut inbound: mpsc::Receiver<InboundFrame>) {
    while let Some(frame) = inbound.recv().await {
        handle_frame(&ctx, frame);
    }
    debug!("Dispatch: Inbound queue closed");
}

pub fn handle_frame(ctx: &Arc<MeshContext>, frame: InboundFrame) {
    if frame.sender == ctx.this_node.address {
        debug!("Dispatch: Ignoring own frame");
        return;
    }

    let packet = match codec::decode(&frame.data, frame.sender) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dispatch: Dropping frame from {}: {}", frame.sender, e);
            return;
        }
    };

    debug!(
        "Dispatch: {} from {} (source {})",
        packet.kind(),
        packet.sender,
        packet.source
    );

    match ctx.peers.ensure_peer(packet.sender) {
        Ok(true) => {
            ctx.send(packet.sender, PacketBody::Advertisement);
        }
        Ok(false) => {}
        Err(e) => warn!("Dispatch: Failed to add peer {}: {}", packet.sender, e),
    }
    ctx.peers.touch(packet.sender);

    match packet.body {
        PacketBody::Advertisement => {
            debug!("Dispatch: Advertisement from {}", packet.sender);
        }
        PacketBody::RootInfoRequest => discovery::handle_request(ctx, &packet),
        PacketBody::RootInfoResponse { root } => discovery::handle_response(ctx, &packet, root),
        PacketBody::RootVote { candidate } => election::handle_vote(ctx, &packet, candidate),
        PacketBody::Unsupported { kind } => {
            error!("Dispatch: Unsupported packet type {} from {}", kind, packet.sender);
        }
    }
}
