// Path: crates/consensus/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! YAC consensus for the Meridian ledger node.
//!
//! YAC is a leader-rotated vote-gossip BFT protocol: each round, every
//! peer signs the `(proposal_hash, block_hash)` pair it derived from its
//! candidate block and walks the ordered peer ring with it, one timed
//! step per peer, until a supermajority certificate forms. Commit and
//! reject certificates are pushed to the whole cluster; late peers are
//! repaired point-to-point.

/// Validator ordering for one consensus round.
pub mod cluster;
/// The consensus gate: candidate votes in, typed round outcomes out.
pub mod gate;
/// Per-round vote aggregation, certificates and cleanup.
pub mod storage;
/// The cancellable vote-step timer.
pub mod timer;
/// The YAC state machine.
pub mod yac;

pub use cluster::ClusterOrdering;
pub use gate::{ConsensusResultCache, YacGate};
pub use storage::{Answer, ProposalState, YacVoteStorage};
pub use yac::Yac;
