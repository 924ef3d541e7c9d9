// Path: crates/api/src/consensus/mod.rs
//! Consensus gate outcome types.
//!
//! The consensus gate translates raw commit/reject certificates into one
//! of these outcomes per round; the synchronizer consumes them.

use meridian_types::app::{Block, Hash, PublicKey, Round, TransactionRejection};

/// A candidate block produced by the simulator for one round; the input
/// of the consensus gate.
#[derive(Clone, Debug)]
pub struct CandidateBlock {
    /// The round the candidate belongs to.
    pub round: Round,
    /// Hash of the proposal the candidate was built from.
    pub proposal_hash: Hash,
    /// The signed candidate block.
    pub block: Block,
    /// Stateful rejections recorded while building the candidate.
    pub rejected: Vec<TransactionRejection>,
}

/// The committed hash pair plus the voters who certified it; enough for
/// the synchronizer to fetch the agreed block from a committer.
#[derive(Clone, Debug)]
pub struct CommitInfo {
    /// Payload hash of the committed block.
    pub block_hash: Hash,
    /// Public keys of the peers whose votes formed the commit.
    pub voters: Vec<PublicKey>,
}

/// The per-round outcome emitted by the consensus gate.
#[derive(Clone, Debug)]
pub enum GateOutcome {
    /// The cluster committed the block this node voted for; commit
    /// signatures are already merged into it.
    PairValid {
        /// The agreed block, ready to apply.
        block: Block,
        /// The resolved round.
        round: Round,
    },
    /// The cluster committed a different block; it must be downloaded
    /// from one of the committing voters.
    VoteOther {
        /// What the committers agreed on.
        commit: CommitInfo,
        /// The resolved round.
        round: Round,
    },
    /// The round was rejected with votes spread over different proposals.
    ProposalReject {
        /// The resolved round.
        round: Round,
    },
    /// The round was rejected: proposals matched but blocks differed.
    BlockReject {
        /// The resolved round.
        round: Round,
    },
    /// The cluster agreed there was nothing to commit this round.
    AgreementOnNone {
        /// The resolved round.
        round: Round,
    },
}

impl GateOutcome {
    /// The round this outcome resolves.
    pub fn round(&self) -> Round {
        match self {
            Self::PairValid { round, .. }
            | Self::VoteOther { round, .. }
            | Self::ProposalReject { round }
            | Self::BlockReject { round }
            | Self::AgreementOnNone { round } => *round,
        }
    }
}
