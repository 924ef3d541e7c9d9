// Path: crates/consensus/src/gate.rs
//! The consensus gate.
//!
//! Wraps the state machine: candidate blocks come in, get voted on, and
//! raw certificates come back out translated into typed round outcomes.
//! The gate owns the block this node voted for; the consensus result
//! cache shares it with the block-loader service so a peer that voted for
//! the same block can fetch it before it is committed.

use crate::cluster::ClusterOrdering;
use crate::storage::Answer;
use crate::yac::Yac;
use meridian_api::consensus::{CandidateBlock, CommitInfo, GateOutcome};
use meridian_api::state::PeerQuery;
use meridian_types::app::{Block, Hash, YacHash};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Holds the most recently voted-for block until the next round begins,
/// for serving to peers through the block loader.
#[derive(Default)]
pub struct ConsensusResultCache {
    block: Mutex<Option<Block>>,
}

impl ConsensusResultCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached block.
    pub fn insert(&self, block: Block) {
        let mut guard = match self.block.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(block);
    }

    /// The cached block, if its payload hash matches.
    pub fn get(&self, hash: &Hash) -> Option<Block> {
        let guard = match self.block.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_ref().filter(|b| b.hash() == *hash).cloned()
    }
}

struct CurrentRound {
    hash: YacHash,
    block: Block,
}

/// The consensus gate.
pub struct YacGate {
    yac: Arc<Yac>,
    peer_query: Arc<dyn PeerQuery>,
    result_cache: Arc<ConsensusResultCache>,
    current: Mutex<Option<CurrentRound>>,
    outcome_tx: mpsc::Sender<GateOutcome>,
}

impl YacGate {
    /// Creates the gate; translated outcomes flow into `outcome_tx`.
    pub fn new(
        yac: Arc<Yac>,
        peer_query: Arc<dyn PeerQuery>,
        result_cache: Arc<ConsensusResultCache>,
        outcome_tx: mpsc::Sender<GateOutcome>,
    ) -> Self {
        Self {
            yac,
            peer_query,
            result_cache,
            current: Mutex::new(None),
            outcome_tx,
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<CurrentRound>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Votes for a candidate block. An empty proposal (no surviving and
    /// no rejected transactions) votes for nothing.
    pub fn vote_for(&self, candidate: CandidateBlock) {
        let proposal_was_empty = candidate.block.payload.transactions.is_empty()
            && candidate.block.payload.rejected_transactions_hashes.is_empty();

        let hash = if proposal_was_empty {
            debug!(round = %candidate.round, "agreeing on nothing this round");
            YacHash::empty(candidate.round)
        } else {
            let block_hash = candidate.block.hash();
            YacHash {
                round: candidate.round,
                proposal_hash: candidate.proposal_hash,
                block_hash,
                block_signature: candidate.block.signatures.iter().next(),
            }
        };

        *self.lock_current() = Some(CurrentRound {
            hash: hash.clone(),
            block: candidate.block.clone(),
        });
        if !proposal_was_empty {
            self.result_cache.insert(candidate.block);
        }

        let peers = match self.peer_query.ledger_peers() {
            Ok(peers) => peers,
            Err(e) => {
                warn!(error = %e, "cannot vote: validator set unavailable");
                return;
            }
        };
        let Some(order) = ClusterOrdering::create(peers) else {
            warn!("cannot vote: validator set is empty");
            return;
        };
        self.yac.vote(hash, order);
    }

    /// Translates a certificate into the typed round outcome.
    pub async fn on_answer(&self, answer: Answer) {
        let outcome = match &answer {
            Answer::Commit(votes) => self.handle_commit(votes),
            Answer::Reject(votes) => Self::handle_reject(votes),
        };
        let Some(outcome) = outcome else {
            return;
        };
        if self.outcome_tx.send(outcome).await.is_err() {
            warn!("synchronizer is gone; outcome dropped");
        }
    }

    fn handle_commit(&self, votes: &[meridian_types::app::VoteMessage]) -> Option<GateOutcome> {
        let first = votes.first()?;
        let round = first.hash.round;

        if first.hash.is_empty_proposal() {
            debug!(round = %round, "consensus skipped the round");
            return Some(GateOutcome::AgreementOnNone { round });
        }

        let mut current = self.lock_current();
        match current.as_mut() {
            Some(state) if state.hash == first.hash => {
                // Fold the other voters' block signatures into our block.
                for vote in votes {
                    if let Some(signature) = vote.hash.block_signature {
                        state.block.add_signature(signature);
                    }
                }
                info!(
                    round = %round,
                    block = %state.block.hash(),
                    "commit of the block this node voted for"
                );
                Some(GateOutcome::PairValid {
                    block: state.block.clone(),
                    round,
                })
            }
            _ => {
                info!(round = %round, "voted for another block; synchronization required");
                Some(GateOutcome::VoteOther {
                    commit: CommitInfo {
                        block_hash: first.hash.block_hash,
                        voters: votes.iter().map(|v| v.signature.public_key).collect(),
                    },
                    round,
                })
            }
        }
    }

    fn handle_reject(votes: &[meridian_types::app::VoteMessage]) -> Option<GateOutcome> {
        let first = votes.first()?;
        let round = first.hash.round;
        let proposals_match = votes
            .iter()
            .all(|v| v.hash.proposal_hash == first.hash.proposal_hash);
        if proposals_match {
            info!(round = %round, "block reject: proposals matched, blocks differed");
            Some(GateOutcome::BlockReject { round })
        } else {
            info!(round = %round, "proposal reject: votes spread over proposals");
            Some(GateOutcome::ProposalReject { round })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_types::app::{BlockPayload, PublicKey, Round, Signature, SignatureBytes};

    fn block(height: u64, txs: usize) -> Block {
        let transactions = (0..txs)
            .map(|i| {
                meridian_types::app::Transaction::new(meridian_types::app::TransactionPayload {
                    creator_account_id: "a@dom".parse().unwrap(),
                    created_time: i as u64,
                    quorum: 1,
                    commands: vec![],
                })
            })
            .collect();
        Block::new(BlockPayload {
            height,
            prev_hash: Hash::EMPTY,
            created_time: 9,
            transactions,
            rejected_transactions_hashes: vec![],
        })
    }

    #[test]
    fn result_cache_checks_the_hash() {
        let cache = ConsensusResultCache::new();
        let b = block(2, 1);
        cache.insert(b.clone());
        assert_eq!(cache.get(&b.hash()), Some(b));
        assert_eq!(cache.get(&Hash::of(b"other")), None);
    }

    #[test]
    fn reject_classification() {
        let sig = Signature {
            public_key: PublicKey([1u8; 32]),
            signature: SignatureBytes([0u8; 64]),
        };
        let vote = |proposal: &[u8], block: &[u8]| meridian_types::app::VoteMessage {
            hash: YacHash {
                round: Round::initial(),
                proposal_hash: Hash::of(proposal),
                block_hash: Hash::of(block),
                block_signature: None,
            },
            signature: sig,
        };

        match YacGate::handle_reject(&[vote(b"p", b"b1"), vote(b"p", b"b2")]) {
            Some(GateOutcome::BlockReject { .. }) => {}
            other => panic!("expected block reject, got {other:?}"),
        }
        match YacGate::handle_reject(&[vote(b"p1", b"b1"), vote(b"p2", b"b2")]) {
            Some(GateOutcome::ProposalReject { .. }) => {}
            other => panic!("expected proposal reject, got {other:?}"),
        }
    }
}
