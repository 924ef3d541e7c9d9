// Path: crates/types/src/app/consensus.rs
//! Consensus rounds, YAC hashes and vote messages.

use super::{Hash, Signature};
use crate::codec;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one consensus attempt.
///
/// `block_round` is the height the round will produce on commit;
/// `reject_round` starts at [`Round::FIRST_REJECT`] and increases on every
/// rejection within the same `block_round`. The derived order is
/// lexicographic, `block_round` first.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Encode,
    Decode,
    Serialize,
    Deserialize,
)]
pub struct Round {
    /// The height this round produces on commit.
    pub block_round: u64,
    /// The rejection ordinal within `block_round`.
    pub reject_round: u32,
}

impl Round {
    /// The first reject ordinal of any block round.
    pub const FIRST_REJECT: u32 = 1;

    /// Creates a round.
    pub fn new(block_round: u64, reject_round: u32) -> Self {
        Self {
            block_round,
            reject_round,
        }
    }

    /// The first round of agreement after a genesis block at height 1.
    pub fn initial() -> Self {
        Self::new(2, Self::FIRST_REJECT)
    }

    /// The round following this one after a commit.
    pub fn next_on_commit(&self) -> Round {
        Round::new(self.block_round + 1, Self::FIRST_REJECT)
    }

    /// The round following this one after a reject or an empty outcome.
    pub fn next_on_reject(&self) -> Round {
        Round::new(self.block_round, self.reject_round + 1)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block_round, self.reject_round)
    }
}

/// The value a peer votes for in one round: the proposal/block hash pair,
/// plus the voter's signature over the block so that commit messages carry
/// enough material to complete the block's signature set.
///
/// Equality ignores `block_signature`: two peers voting for the same pair
/// agree even though their block signatures differ.
#[derive(Clone, Debug, Encode, Decode)]
pub struct YacHash {
    /// The round the vote belongs to.
    pub round: Round,
    /// Hash of the proposal; [`Hash::EMPTY`] when voting for nothing.
    pub proposal_hash: Hash,
    /// Hash of the candidate block built from the proposal.
    pub block_hash: Hash,
    /// The voter's signature over the candidate block payload hash.
    pub block_signature: Option<Signature>,
}

impl YacHash {
    /// A vote value for a round with no proposal.
    pub fn empty(round: Round) -> Self {
        Self {
            round,
            proposal_hash: Hash::EMPTY,
            block_hash: Hash::EMPTY,
            block_signature: None,
        }
    }

    /// True when this hash votes for nothing.
    pub fn is_empty_proposal(&self) -> bool {
        self.proposal_hash.is_empty()
    }

    /// The bytes a vote signature covers: round and hash pair, block
    /// signature excluded.
    pub fn signable_bytes(&self) -> Vec<u8> {
        codec::to_bytes_canonical(&(self.round, self.proposal_hash, self.block_hash))
    }
}

impl PartialEq for YacHash {
    fn eq(&self, other: &Self) -> bool {
        self.round == other.round
            && self.proposal_hash == other.proposal_hash
            && self.block_hash == other.block_hash
    }
}

impl Eq for YacHash {}

/// The BFT supermajority threshold for a cluster of `all` peers:
/// `2 * ((all - 1) / 3) + 1`.
pub fn supermajority_threshold(all: usize) -> usize {
    let f = all.saturating_sub(1) / 3;
    2 * f + 1
}

/// Whether `current` votes out of `all` reach BFT supermajority.
pub fn has_supermajority(current: usize, all: usize) -> bool {
    current <= all && current >= supermajority_threshold(all)
}

/// One peer's signed vote for a round.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct VoteMessage {
    /// The voted value.
    pub hash: YacHash,
    /// The voter's signature over [`YacHash::signable_bytes`].
    pub signature: Signature,
}
