//! Root state shared by the dispatch loop and the election task
//!
//! The three protocol fields (`root_node`, `is_root_defined`, `is_voting`)
//! only change together through the transitions below. Callers hold the
//! node's state lock for the duration of one transition and never across a
//! send or a sleep.

use crate::types::NodeInfo;
use tracing::{info, warn};

/// Result of asking to start an election
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionStart {
    /// Voting began; the caller must run the election task
    Started,
    /// An election is already running on this node
    AlreadyVoting,
    /// A root is settled; no election needed
    AlreadyResolved,
}

/// Result of a `RootInfoResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Root learned from a neighbor
    Adopted { during_vote: bool },
    /// Same root we already had
    Confirmed,
    /// A neighbor names a different root than our settled one
    Conflict { current: NodeInfo, claimed: NodeInfo },
}

/// Result of applying a `RootVote`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Candidate was strictly better and replaced ours
    Adopted { previous: NodeInfo },
    /// Ours is as good or better
    Kept,
    /// Root already settled; the vote changes nothing
    Resolved { root: NodeInfo, voting: bool },
}

/// What a received vote did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    /// This vote pulled the node into the election
    pub joined: bool,
    pub outcome: VoteOutcome,
}

/// Result of closing the vote rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The election's candidate became the root
    Committed(NodeInfo),
    /// Discovery settled the root while rounds were running
    AlreadyDefined(NodeInfo),
}

/// Node-local root state
#[derive(Debug, Clone)]
pub struct RootState {
    this_node: NodeInfo,
    root_node: NodeInfo,
    is_root_defined: bool,
    is_voting: bool,
    root_conflicts: u64,
}

impl RootState {
    /// Every node starts as its own candidate
    pub fn new(this_node: NodeInfo) -> Self {
        Self {
            this_node,
            root_node: this_node,
            is_root_defined: false,
            is_voting: false,
            root_conflicts: 0,
        }
    }

    pub fn this_node(&self) -> NodeInfo {
        self.this_node
    }

    pub fn root_node(&self) -> NodeInfo {
        self.root_node
    }

    pub fn is_root_defined(&self) -> bool {
        self.is_root_defined
    }

    pub fn is_voting(&self) -> bool {
        self.is_voting
    }

    /// Conflicting root claims seen so far
    pub fn root_conflicts(&self) -> u64 {
        self.root_conflicts
    }

    /// Discovery keeps asking only while nothing is settled or running
    pub fn should_search(&self) -> bool {
        !self.is_root_defined && !self.is_voting
    }

    /// Enter voting with ourselves as the first candidate
    pub fn begin_election(&mut self) -> ElectionStart {
        if self.is_voting {
            return ElectionStart::AlreadyVoting;
        }
        if self.is_root_defined {
            return ElectionStart::AlreadyResolved;
        }

        self.is_voting = true;
        self.root_node = self.this_node;
        info!("Election: Voting started, nominating {}", self.this_node);
        ElectionStart::Started
    }

    /// Root to hand to a neighbor asking for it, if settled
    pub fn on_root_info_request(&self) -> Option<NodeInfo> {
        self.is_root_defined.then_some(self.root_node)
    }

    pub fn on_root_info_response(&mut self, root: NodeInfo) -> ResponseOutcome {
        let during_vote = self.is_voting;

        if self.is_root_defined {
            if root.address == self.root_node.address {
                return ResponseOutcome::Confirmed;
            }
            self.root_conflicts += 1;
            return ResponseOutcome::Conflict {
                current: self.root_node,
                claimed: root,
            };
        }

        self.root_node = root;
        self.is_root_defined = true;
        info!("Discovery: Adopted root {}", root);
        ResponseOutcome::Adopted { during_vote }
    }

    /// Handle a vote, joining the election first if none is running
    pub fn on_root_vote(&mut self, candidate: NodeInfo) -> VoteReceipt {
        let joined = !self.is_voting && self.begin_election() == ElectionStart::Started;
        let outcome = self.apply_vote(candidate);
        VoteReceipt { joined, outcome }
    }

    /// Max-selection on quality; ties keep the current candidate
    pub fn apply_vote(&mut self, candidate: NodeInfo) -> VoteOutcome {
        if self.is_root_defined {
            if candidate.address != self.root_node.address && candidate.outranks(&self.root_node) {
                warn!(
                    "Election: Late vote for {} after root {} was settled",
                    candidate, self.root_node
                );
            }
            return VoteOutcome::Resolved {
                root: self.root_node,
                voting: self.is_voting,
            };
        }

        if candidate.outranks(&self.root_node) {
            let previous = self.root_node;
            self.root_node = candidate;
            info!("Election: Candidate {} replaces {}", candidate, previous);
            VoteOutcome::Adopted { previous }
        } else {
            info!(
                "Election: Current quality {} | candidate quality {}",
                self.root_node.quality, candidate.quality
            );
            VoteOutcome::Kept
        }
    }

    /// Close the vote rounds. Never overwrites a root settled by discovery.
    pub fn commit_election(&mut self) -> CommitOutcome {
        if self.is_root_defined {
            warn!(
                "Election: Rounds finished but root {} was already settled",
                self.root_node
            );
            return CommitOutcome::AlreadyDefined(self.root_node);
        }

        self.is_root_defined = true;
        info!("Election: Root node {}", self.root_node);
        CommitOutcome::Committed(self.root_node)
    }

    /// Leave voting after the settle period
    pub fn finish_election(&mut self) {
        self.is_voting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MacAddress;
    use proptest::prelude::*;

    fn node(last: u8, quality: i8) -> NodeInfo {
        NodeInfo::new(MacAddress([2, 0, 0, 0, 0, last]), quality)
    }

    #[test]
    fn test_starts_as_own_candidate() {
        let me = node(1, -40);
        let state = RootState::new(me);
        assert_eq!(state.root_node(), me);
        assert!(!state.is_root_defined());
        assert!(!state.is_voting());
        assert!(state.should_search());
        assert_eq!(state.on_root_info_request(), None);
    }

    #[test]
    fn test_second_election_is_noop() {
        let mut state = RootState::new(node(1, -40));
        assert_eq!(state.begin_election(), ElectionStart::Started);
        assert_eq!(state.begin_election(), ElectionStart::AlreadyVoting);
        assert!(!state.should_search());

        let receipt = state.on_root_vote(node(2, -90));
        assert!(!receipt.joined);
    }

    #[test]
    fn test_vote_joins_election() {
        let mut state = RootState::new(node(1, -40));
        let receipt = state.on_root_vote(node(3, -30));

        assert!(receipt.joined);
        assert!(state.is_voting());
        assert_eq!(
            receipt.outcome,
            VoteOutcome::Adopted {
                previous: node(1, -40)
            }
        );
        assert_eq!(state.root_node(), node(3, -30));
    }

    #[test]
    fn test_vote_adopts_address_and_quality() {
        let mut state = RootState::new(node(1, -40));
        state.begin_election();

        state.apply_vote(node(3, -30));
        // -35 beats our own -40 but not the adopted -30
        assert_eq!(state.apply_vote(node(4, -35)), VoteOutcome::Kept);
        assert_eq!(state.root_node(), node(3, -30));
    }

    #[test]
    fn test_equal_quality_keeps_first_seen() {
        let mut state = RootState::new(node(1, -40));
        state.begin_election();
        assert_eq!(state.apply_vote(node(2, -40)), VoteOutcome::Kept);
        assert_eq!(state.root_node().address, node(1, -40).address);
    }

    #[test]
    fn test_response_adopts_and_is_idempotent() {
        let mut state = RootState::new(node(4, -70));
        let root = node(1, -40);

        assert_eq!(
            state.on_root_info_response(root),
            ResponseOutcome::Adopted { during_vote: false }
        );
        assert!(state.is_root_defined());
        assert_eq!(state.root_node(), root);

        assert_eq!(state.on_root_info_response(root), ResponseOutcome::Confirmed);
        assert_eq!(state.root_node(), root);
        assert_eq!(state.root_conflicts(), 0);
        assert_eq!(state.on_root_info_request(), Some(root));
    }

    #[test]
    fn test_response_conflict_keeps_root() {
        let mut state = RootState::new(node(1, -40));
        state.on_root_info_response(node(1, -40));

        let outcome = state.on_root_info_response(node(2, -20));
        assert_eq!(
            outcome,
            ResponseOutcome::Conflict {
                current: node(1, -40),
                claimed: node(2, -20)
            }
        );
        assert_eq!(state.root_node().address, node(1, -40).address);
        assert_eq!(state.root_conflicts(), 1);
    }

    #[test]
    fn test_commit_does_not_override_discovery() {
        let mut state = RootState::new(node(1, -40));
        state.begin_election();
        state.apply_vote(node(2, -30));

        assert_eq!(
            state.on_root_info_response(node(9, -80)),
            ResponseOutcome::Adopted { during_vote: true }
        );
        assert_eq!(state.commit_election(), CommitOutcome::AlreadyDefined(node(9, -80)));
        assert_eq!(state.root_node(), node(9, -80));

        state.finish_election();
        assert!(!state.is_voting());
        assert!(state.is_root_defined());
    }

    #[test]
    fn test_commit_settles_candidate() {
        let mut state = RootState::new(node(1, -40));
        state.begin_election();
        state.apply_vote(node(3, -30));

        assert_eq!(state.commit_election(), CommitOutcome::Committed(node(3, -30)));
        assert!(state.is_root_defined());
        assert!(state.is_voting());
    }

    #[test]
    fn test_votes_after_commit_do_not_move_root() {
        let mut state = RootState::new(node(1, -40));
        state.begin_election();
        state.commit_election();

        let outcome = state.apply_vote(node(5, -10));
        assert_eq!(
            outcome,
            VoteOutcome::Resolved {
                root: node(1, -40),
                voting: true
            }
        );
        assert_eq!(state.root_node(), node(1, -40));
    }

    #[test]
    fn test_resolved_node_does_not_rejoin() {
        let mut state = RootState::new(node(1, -40));
        state.begin_election();
        state.commit_election();
        state.finish_election();

        let receipt = state.on_root_vote(node(7, -20));
        assert!(!receipt.joined);
        assert!(!state.is_voting());
        assert_eq!(
            receipt.outcome,
            VoteOutcome::Resolved {
                root: node(1, -40),
                voting: false
            }
        );
    }

    proptest! {
        #[test]
        fn vote_quality_never_decreases(
            own in any::<i8>(),
            votes in proptest::collection::vec((1u8..=254, any::<i8>()), 1..40),
        ) {
            let mut state = RootState::new(node(0, own));
            state.begin_election();

            let mut best = own;
            for (last, quality) in votes {
                let before = state.root_node().quality;
                state.apply_vote(node(last, quality));
                let after = state.root_node().quality;
                prop_assert!(after >= before);
                best = best.max(quality);
            }
            prop_assert_eq!(state.root_node().quality, best);
        }
    }
}
