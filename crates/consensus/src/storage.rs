// Path: crates/consensus/src/storage.rs
//! Per-round vote aggregation, certificates and cleanup.
//!
//! Votes are bucketed per round and proposal hash. A bucket reaching the
//! BFT supermajority threshold yields a certificate: `Commit` when every
//! vote names the same block hash, `Reject` otherwise. Storage also
//! tracks, per proposal hash, how far this node got with propagating and
//! processing the certificate, and evicts rounds that fell behind the
//! last committed round.

use meridian_types::app::{supermajority_threshold, Hash, Round, VoteMessage};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// How far this node has taken a resolved proposal hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalState {
    /// Certificate known but neither propagated nor processed.
    NotSentNotProcessed,
    /// Certificate propagated to the cluster, outcome not yet emitted.
    SentNotProcessed,
    /// Certificate propagated and outcome emitted.
    SentProcessed,
}

/// A supermajority certificate for one round.
#[derive(Clone, Debug)]
pub enum Answer {
    /// Supermajority on one `(proposal, block)` pair.
    Commit(Vec<VoteMessage>),
    /// Supermajority of votes on the proposal without block agreement.
    Reject(Vec<VoteMessage>),
}

impl Answer {
    /// The votes backing the certificate.
    pub fn votes(&self) -> &[VoteMessage] {
        match self {
            Self::Commit(votes) | Self::Reject(votes) => votes,
        }
    }

    /// The round the certificate resolves.
    pub fn round(&self) -> Option<Round> {
        self.votes().first().map(|v| v.hash.round)
    }
}

struct Bucket {
    votes: Vec<VoteMessage>,
    state: ProposalState,
}

#[derive(Default)]
struct RoundStorage {
    buckets: HashMap<Hash, Bucket>,
}

/// Tracks the highest committed and rejected rounds and decides which
/// round states to keep. A commit supersedes every earlier reject.
#[derive(Default)]
struct BufferedCleanupStrategy {
    created: BTreeSet<Round>,
    last_commit: Option<Round>,
    last_reject: Option<Round>,
}

impl BufferedCleanupStrategy {
    fn should_create(&mut self, round: Round) -> bool {
        let allowed = match self.minimal_round() {
            Some(min) => min <= round,
            None => true,
        };
        if allowed {
            self.created.insert(round);
        }
        allowed
    }

    fn minimal_round(&self) -> Option<Round> {
        match (self.last_commit, self.last_reject) {
            (Some(c), Some(r)) => Some(c.min(r)),
            (Some(c), None) => Some(c),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        }
    }

    /// Records the outcome of `round` and returns the rounds to evict.
    fn finalize(&mut self, round: Round, committed: bool) -> Vec<Round> {
        if committed {
            self.last_commit = Some(self.last_commit.map_or(round, |c| c.max(round)));
            // Rejects before the commit are not needed by anyone anymore.
            if let (Some(c), Some(r)) = (self.last_commit, self.last_reject) {
                if r < c {
                    self.last_reject = None;
                }
            }
        } else {
            self.last_reject = Some(self.last_reject.map_or(round, |r| r.max(round)));
        }

        let mut removed = Vec::new();
        if let Some(commit) = self.last_commit {
            while let Some(oldest) = self.created.first().copied() {
                if oldest >= commit {
                    break;
                }
                self.created.remove(&oldest);
                removed.push(oldest);
            }
        }
        removed
    }
}

/// Per-round vote aggregation with supermajority detection.
#[derive(Default)]
pub struct YacVoteStorage {
    rounds: HashMap<Round, RoundStorage>,
    cleanup: BufferedCleanupStrategy,
}

impl YacVoteStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores verified votes for their round. Returns the certificate
    /// when the target proposal bucket holds a supermajority of
    /// `cluster_size`, or a reject certificate over every vote of the
    /// round once no bucket can reach it anymore (votes split over
    /// proposals).
    ///
    /// Invalid signatures are dropped here; a vote for a round already
    /// evicted is dropped as out-of-round; one voter counts once per
    /// round, whichever bucket its first vote landed in.
    pub fn store(&mut self, votes: Vec<VoteMessage>, cluster_size: usize) -> Option<Answer> {
        let mut verified = votes
            .into_iter()
            .filter(|vote| {
                let ok = meridian_crypto::verify(&vote.signature, &vote.hash.signable_bytes());
                if !ok {
                    warn!(voter = %vote.signature.public_key, "dropping vote with bad signature");
                }
                ok
            })
            .peekable();

        let first = verified.peek()?.clone();
        let round = first.hash.round;
        if !self.cleanup.should_create(round) {
            debug!(round = %round, "dropping votes for an already resolved round");
            return None;
        }

        let storage = self.rounds.entry(round).or_default();
        for vote in verified {
            if vote.hash.round != round {
                warn!("dropping vote outside the message's round");
                continue;
            }
            let voter = vote.signature.public_key;
            if storage
                .buckets
                .values()
                .any(|b| b.votes.iter().any(|v| v.signature.public_key == voter))
            {
                continue;
            }
            storage
                .buckets
                .entry(vote.hash.proposal_hash)
                .or_insert_with(|| Bucket {
                    votes: Vec::new(),
                    state: ProposalState::NotSentNotProcessed,
                })
                .votes
                .push(vote);
        }

        let threshold = supermajority_threshold(cluster_size);
        let target = storage
            .buckets
            .entry(first.hash.proposal_hash)
            .or_insert_with(|| Bucket {
                votes: Vec::new(),
                state: ProposalState::NotSentNotProcessed,
            });
        if target.votes.len() >= threshold {
            let agreed_block = target.votes.first().map(|v| v.hash.block_hash);
            let unanimous = target
                .votes
                .iter()
                .all(|v| Some(v.hash.block_hash) == agreed_block);
            return Some(if unanimous {
                Answer::Commit(target.votes.clone())
            } else {
                Answer::Reject(target.votes.clone())
            });
        }

        // No bucket resolved; check whether one still can. Outstanding
        // voters could all join the currently strongest bucket.
        let total: usize = storage.buckets.values().map(|b| b.votes.len()).sum();
        let strongest = storage
            .buckets
            .values()
            .map(|b| b.votes.len())
            .max()
            .unwrap_or(0);
        let outstanding = cluster_size.saturating_sub(total);
        if strongest + outstanding < threshold {
            let all_votes: Vec<VoteMessage> = storage
                .buckets
                .values()
                .flat_map(|b| b.votes.iter().cloned())
                .collect();
            debug!(round = %round, "no proposal can reach supermajority; rejecting");
            return Some(Answer::Reject(all_votes));
        }
        None
    }

    /// True once the round has been finalized by a commit or reject.
    pub fn is_resolved(&self, round: Round) -> bool {
        self.cleanup.last_commit.map_or(false, |c| round <= c)
            || self.cleanup.last_reject.map_or(false, |r| round <= r)
    }

    /// The processing state of a resolved proposal hash.
    pub fn processing_state(&self, round: Round, proposal_hash: &Hash) -> ProposalState {
        self.rounds
            .get(&round)
            .and_then(|s| s.buckets.get(proposal_hash))
            .map(|b| b.state)
            .unwrap_or(ProposalState::NotSentNotProcessed)
    }

    /// Advances the processing state one step.
    pub fn next_processing_state(&mut self, round: Round, proposal_hash: &Hash) {
        if let Some(bucket) = self
            .rounds
            .get_mut(&round)
            .and_then(|s| s.buckets.get_mut(proposal_hash))
        {
            bucket.state = match bucket.state {
                ProposalState::NotSentNotProcessed => ProposalState::SentNotProcessed,
                ProposalState::SentNotProcessed | ProposalState::SentProcessed => {
                    ProposalState::SentProcessed
                }
            };
        }
    }

    /// Records the round outcome and evicts superseded round state.
    pub fn finalize_round(&mut self, round: Round, committed: bool) {
        for evicted in self.cleanup.finalize(round, committed) {
            self.rounds.remove(&evicted);
            debug!(round = %evicted, "evicted vote storage for round");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_crypto::KeyPair;
    use meridian_types::app::YacHash;

    fn vote(pair: &KeyPair, round: Round, proposal: &[u8], block: &[u8]) -> VoteMessage {
        let hash = YacHash {
            round,
            proposal_hash: Hash::of(proposal),
            block_hash: Hash::of(block),
            block_signature: None,
        };
        let signature = pair.sign(&hash.signable_bytes());
        VoteMessage { hash, signature }
    }

    #[test]
    fn supermajority_commit_requires_threshold() {
        let pairs: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
        let round = Round::initial();
        let mut storage = YacVoteStorage::new();

        assert!(storage
            .store(vec![vote(&pairs[0], round, b"p", b"b")], 4)
            .is_none());
        assert!(storage
            .store(vec![vote(&pairs[1], round, b"p", b"b")], 4)
            .is_none());
        // Third vote crosses 2f+1 = 3.
        match storage.store(vec![vote(&pairs[2], round, b"p", b"b")], 4) {
            Some(Answer::Commit(votes)) => assert_eq!(votes.len(), 3),
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn diverging_blocks_reject() {
        let pairs: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
        let round = Round::initial();
        let mut storage = YacVoteStorage::new();

        storage.store(vec![vote(&pairs[0], round, b"p", b"b1")], 4);
        storage.store(vec![vote(&pairs[1], round, b"p", b"b2")], 4);
        match storage.store(vec![vote(&pairs[2], round, b"p", b"b1")], 4) {
            Some(Answer::Reject(votes)) => assert_eq!(votes.len(), 3),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn split_over_proposals_rejects_once_unreachable() {
        // Cluster of 4, threshold 3: a 2-2 split over two proposals can
        // never commit and must reject with every vote of the round.
        let pairs: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
        let round = Round::initial();
        let mut storage = YacVoteStorage::new();

        assert!(storage
            .store(vec![vote(&pairs[0], round, b"p1", b"b1")], 4)
            .is_none());
        assert!(storage
            .store(vec![vote(&pairs[1], round, b"p1", b"b1")], 4)
            .is_none());
        // Third vote on the other proposal: 2 + 1 outstanding = 3, still
        // achievable.
        assert!(storage
            .store(vec![vote(&pairs[2], round, b"p2", b"b2")], 4)
            .is_none());
        // Fourth vote splits 2-2: nobody can reach 3 anymore.
        match storage.store(vec![vote(&pairs[3], round, b"p2", b"b2")], 4) {
            Some(Answer::Reject(votes)) => assert_eq!(votes.len(), 4),
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_votes_do_not_double_count() {
        let pair = KeyPair::generate();
        let round = Round::initial();
        let mut storage = YacVoteStorage::new();

        assert!(storage
            .store(vec![vote(&pair, round, b"p", b"b")], 4)
            .is_none());
        // The same voter again: still below threshold.
        assert!(storage
            .store(vec![vote(&pair, round, b"p", b"b")], 4)
            .is_none());
    }

    #[test]
    fn forged_votes_are_dropped() {
        let pair = KeyPair::generate();
        let round = Round::initial();
        let mut forged = vote(&pair, round, b"p", b"b");
        forged.signature.signature.0[0] ^= 1;

        let mut storage = YacVoteStorage::new();
        // Cluster of one: a single valid vote would commit immediately.
        assert!(storage.store(vec![forged], 1).is_none());
    }

    #[test]
    fn resolved_rounds_are_evicted_and_refuse_new_votes() {
        let pair = KeyPair::generate();
        let old = Round::initial();
        let newer = Round::new(3, 1);
        let mut storage = YacVoteStorage::new();

        storage.store(vec![vote(&pair, old, b"p", b"b")], 1);
        storage.finalize_round(newer, true);

        // Votes for rounds behind the last commit are out-of-round.
        assert!(storage.store(vec![vote(&pair, old, b"p", b"b")], 1).is_none());
    }

    #[test]
    fn commit_supersedes_earlier_reject() {
        let mut cleanup = BufferedCleanupStrategy::default();
        cleanup.finalize(Round::new(2, 3), false);
        assert_eq!(cleanup.last_reject, Some(Round::new(2, 3)));
        cleanup.finalize(Round::new(3, 1), true);
        assert_eq!(cleanup.last_reject, None);
        assert_eq!(cleanup.last_commit, Some(Round::new(3, 1)));
    }

    #[test]
    fn processing_state_advances_monotonically() {
        let pair = KeyPair::generate();
        let round = Round::initial();
        let mut storage = YacVoteStorage::new();
        let v = vote(&pair, round, b"p", b"b");
        let proposal = v.hash.proposal_hash;
        storage.store(vec![v], 1);

        assert_eq!(
            storage.processing_state(round, &proposal),
            ProposalState::NotSentNotProcessed
        );
        storage.next_processing_state(round, &proposal);
        assert_eq!(
            storage.processing_state(round, &proposal),
            ProposalState::SentNotProcessed
        );
        storage.next_processing_state(round, &proposal);
        storage.next_processing_state(round, &proposal);
        assert_eq!(
            storage.processing_state(round, &proposal),
            ProposalState::SentProcessed
        );
    }
}
