//! Root election by gossip max-selection
//!
//! Each voting node rebroadcasts its best candidate every round and adopts
//! any strictly better candidate it hears. After the last round the
//! candidate becomes the root unless discovery settled one meanwhile; voting
//! stays open for a settle period so stragglers can still hear our ballot
//! before anyone starts a new search.
//!
//! Once started, an election task always runs to completion.

use crate::node::MeshContext;
use crate::state::{CommitOutcome, VoteOutcome};
use crate::types::{NodeInfo, Packet, PacketBody};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info};

/// Spawn the election task. The caller must have won `begin_election`.
pub fn spawn_election(ctx: &Arc<MeshContext>) {
    let task = tokio::spawn(run_election(ctx.clone()));
    *ctx.election_task.lock() = Some(task);
}

pub async fn run_election(ctx: Arc<MeshContext>) {
    let rounds = ctx.config.vote_rounds;

    for round in 1..=rounds {
        let candidate = ctx.state.lock().root_node();
        if ctx.broadcast(PacketBody::RootVote { candidate }) {
            info!("Election: Root vote sent ({}/{}) for {}", round, rounds, candidate);
        }
        sleep(ctx.config.interval).await;
    }

    let outcome = ctx.state.lock().commit_election();
    if let CommitOutcome::Committed(root) = outcome {
        if root.address == ctx.this_node.address {
            info!("Election: This node is the root");
        }
    }

    sleep(ctx.config.settle_period()).await;
    ctx.state.lock().finish_election();
    info!("Election: Voting closed");
}

/// Apply a received ballot, joining the election if none is running
pub fn handle_vote(ctx: &Arc<MeshContext>, packet: &Packet, candidate: NodeInfo) {
    info!("Election: Root vote from {} for {}", packet.sender, candidate);

    let receipt = ctx.state.lock().on_root_vote(candidate);
    if receipt.joined {
        spawn_election(ctx);
    }

    match receipt.outcome {
        VoteOutcome::Adopted { .. } | VoteOutcome::Kept => {}
        VoteOutcome::Resolved { voting: true, .. } => {
            debug!("Election: Ballot from {} arrived after commit", packet.sender);
        }
        VoteOutcome::Resolved { root, voting: false } => {
            // The voter missed the settled root; tell it directly
            if ctx.send(packet.sender, PacketBody::RootInfoResponse { root }) {
                info!("Election: Root {} already settled, told {}", root, packet.sender);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeshConfig;
    use crate::sim::SimMedium;
    use crate::types::MacAddress;
    use std::time::Duration;

    const ME: MacAddress = MacAddress([2, 0, 0, 0, 0, 1]);

    fn context(medium: &SimMedium, quality: i8) -> Arc<MeshContext> {
        let radio = medium.attach(ME);
        let config = MeshConfig::default().with_interval(Duration::from_millis(100));
        let ctx = Arc::new(MeshContext::new(config, NodeInfo::new(ME, quality), radio));
        ctx.peers.ensure_peer(MacAddress::BROADCAST).unwrap();
        ctx
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_election_elects_self() {
        let medium = SimMedium::new();
        let ctx = context(&medium, -40);
        ctx.state.lock().begin_election();

        run_election(ctx.clone()).await;

        let state = ctx.state.lock().clone();
        assert!(state.is_root_defined());
        assert!(!state.is_voting());
        assert_eq!(state.root_node().address, ME);

        let votes = medium
            .sent_frames()
            .iter()
            .filter(|f| f.from == ME && f.to.is_broadcast())
            .count();
        assert_eq!(votes, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voting_flag_held_through_settle_period() {
        let medium = SimMedium::new();
        let ctx = context(&medium, -40);
        ctx.state.lock().begin_election();

        let task = tokio::spawn(run_election(ctx.clone()));

        // Past the three rounds, inside the settle period
        sleep(Duration::from_millis(350)).await;
        {
            let state = ctx.state.lock();
            assert!(state.is_root_defined());
            assert!(state.is_voting());
        }

        task.await.unwrap();
        assert!(!ctx.state.lock().is_voting());
    }
}
