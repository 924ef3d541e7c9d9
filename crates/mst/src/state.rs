// Path: crates/mst/src/state.rs
//! The MST state: signature accumulation, completion, expiry.
//!
//! Batches are bucketed by reduced hash; a bucket keeps exactly one
//! representative batch and accumulates signatures per `(tx_index,
//! public_key)`. Completion is evaluated whenever a constituent
//! transaction's signature set grows; completed batches leave the state,
//! which is what makes completion fire exactly once per batch.

use meridian_types::app::{Hash, TimeMs, TransactionBatch};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

/// Strategy deciding when a batch is complete and when it has expired.
pub trait Completer: Send + Sync {
    /// True once the batch needs no more signatures.
    fn is_complete(&self, batch: &TransactionBatch) -> bool;

    /// True once the batch has waited too long for its signatures.
    fn is_expired(&self, batch: &TransactionBatch, now: TimeMs) -> bool;
}

/// The default completer: declared quorum per transaction, fixed TTL from
/// the latest member creation time.
pub struct DefaultCompleter {
    ttl: TimeMs,
}

impl DefaultCompleter {
    /// Creates a completer with the given time-to-live in milliseconds.
    pub fn new(ttl: TimeMs) -> Self {
        Self { ttl }
    }
}

impl Completer for DefaultCompleter {
    fn is_complete(&self, batch: &TransactionBatch) -> bool {
        batch.is_complete()
    }

    fn is_expired(&self, batch: &TransactionBatch, now: TimeMs) -> bool {
        batch.max_created_time().saturating_add(self.ttl) < now
    }
}

/// The outcome of merging a peer state into the local one.
pub struct MergeResult {
    /// Batches that became complete through the merge, removed from the
    /// state.
    pub completed: Vec<TransactionBatch>,
    /// Signatures this side holds that the peer lacked, computed before
    /// the merge; the payload for reciprocal gossip back to the sender.
    pub reciprocal: MstState,
}

/// Set of pending batches, bucketed by reduced hash, with an expiry index.
#[derive(Clone)]
pub struct MstState {
    completer: Arc<dyn Completer>,
    buckets: HashMap<Hash, TransactionBatch>,
    // Min-heap over (max_created_time, reduced_hash); entries are lazily
    // discarded when the bucket is gone.
    expiry: BinaryHeap<Reverse<(TimeMs, Hash)>>,
}

impl MstState {
    /// Creates an empty state with the given completer.
    pub fn empty(completer: Arc<dyn Completer>) -> Self {
        Self {
            completer,
            buckets: HashMap::new(),
            expiry: BinaryHeap::new(),
        }
    }

    /// Rebuilds a state from its wire form (the batch list of a peer's
    /// state message). No completion is evaluated here; that happens on
    /// merge into the local state.
    pub fn from_batches(completer: Arc<dyn Completer>, batches: Vec<TransactionBatch>) -> Self {
        let mut state = Self::empty(completer);
        for batch in batches {
            let reduced = batch.reduced_hash();
            state.expiry.push(Reverse((batch.max_created_time(), reduced)));
            state.buckets.insert(reduced, batch);
        }
        state
    }

    /// True if no batches are pending.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The pending batches, representative signatures included.
    pub fn batches(&self) -> Vec<TransactionBatch> {
        self.buckets.values().cloned().collect()
    }

    /// True if a bucket with this reduced hash is pending.
    pub fn contains(&self, reduced_hash: &Hash) -> bool {
        self.buckets.contains_key(reduced_hash)
    }

    /// Adds a batch, merging its signatures into an existing bucket with
    /// the same reduced hash. Returns the batches completed by this
    /// insertion (removed from the state).
    pub fn insert(&mut self, batch: TransactionBatch) -> Vec<TransactionBatch> {
        let reduced = batch.reduced_hash();
        match self.buckets.get_mut(&reduced) {
            Some(bucket) => {
                for (tx_index, signature) in batch.signatures() {
                    bucket.add_signature(tx_index, signature);
                }
            }
            None => {
                self.expiry
                    .push(Reverse((batch.max_created_time(), reduced)));
                self.buckets.insert(reduced, batch);
            }
        }

        match self.buckets.get(&reduced) {
            Some(bucket) if self.completer.is_complete(bucket) => self
                .buckets
                .remove(&reduced)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Pointwise union with a peer state. Returns the completed batches
    /// and the reciprocal difference (`self \ other`, computed before the
    /// merge) to send back.
    pub fn merge(&mut self, other: &MstState) -> MergeResult {
        let reciprocal = self.difference(other);
        let mut completed = Vec::new();
        for batch in other.buckets.values() {
            completed.extend(self.insert(batch.clone()));
        }
        MergeResult {
            completed,
            reciprocal,
        }
    }

    /// The buckets present here whose signatures are absent there.
    pub fn difference(&self, other: &MstState) -> MstState {
        let mut diff = MstState::empty(self.completer.clone());
        for (reduced, batch) in &self.buckets {
            match other.buckets.get(reduced) {
                None => {
                    diff.buckets.insert(*reduced, batch.clone());
                }
                Some(theirs) => {
                    let mut fresh = batch.clone();
                    let mut has_new = false;
                    for (tx_index, tx) in fresh.transactions.iter_mut().enumerate() {
                        let their_keys = theirs.signatories(tx_index);
                        let keep: Vec<_> = tx
                            .signatures
                            .iter()
                            .filter(|s| !their_keys.contains(&s.public_key))
                            .collect();
                        tx.signatures = keep.iter().copied().collect();
                        has_new |= !keep.is_empty();
                    }
                    if has_new {
                        diff.buckets.insert(*reduced, fresh);
                    }
                }
            }
        }
        diff
    }

    /// Removes and returns every batch whose TTL ran out at `now`.
    pub fn erase_expired(&mut self, now: TimeMs) -> Vec<TransactionBatch> {
        let mut expired = Vec::new();
        while let Some(Reverse((_, reduced))) = self.expiry.peek().copied() {
            match self.buckets.get(&reduced) {
                Some(batch) if self.completer.is_expired(batch, now) => {
                    self.expiry.pop();
                    if let Some(batch) = self.buckets.remove(&reduced) {
                        expired.push(batch);
                    }
                }
                Some(_) => break,
                None => {
                    // Bucket already completed; drop the stale entry.
                    self.expiry.pop();
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_types::app::{
        PublicKey, Signature, SignatureBytes, Transaction, TransactionPayload,
    };

    fn completer() -> Arc<dyn Completer> {
        Arc::new(DefaultCompleter::new(1000))
    }

    fn sig(byte: u8) -> Signature {
        Signature {
            public_key: PublicKey([byte; 32]),
            signature: SignatureBytes([byte; 64]),
        }
    }

    fn batch(creator: &str, quorum: u32, created_time: TimeMs) -> TransactionBatch {
        TransactionBatch::new(vec![Transaction::new(TransactionPayload {
            creator_account_id: creator.parse().unwrap(),
            created_time,
            quorum,
            commands: vec![],
        })])
    }

    #[test]
    fn signatures_accumulate_across_copies() {
        let mut state = MstState::empty(completer());

        let mut first = batch("a@dom", 2, 5);
        first.add_signature(0, sig(1));
        assert!(state.insert(first).is_empty());

        // A reduced-hash-equal copy carrying the second signature.
        let mut second = batch("a@dom", 2, 5);
        second.add_signature(0, sig(2));
        let completed = state.insert(second);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].transactions[0].signatures.len(), 2);
        // Completion removes the bucket.
        assert!(state.is_empty());
    }

    #[test]
    fn completion_fires_exactly_once_under_repeated_merge() {
        // Property: merging q distinct single-signature states completes
        // the batch exactly once, idempotently.
        let mut state = MstState::empty(completer());

        let mut one = batch("a@dom", 2, 5);
        one.add_signature(0, sig(1));
        let mut two = batch("a@dom", 2, 5);
        two.add_signature(0, sig(2));

        let mut peer_one = MstState::empty(completer());
        assert!(peer_one.insert(one).is_empty());
        let mut peer_two = MstState::empty(completer());
        assert!(peer_two.insert(two).is_empty());

        let mut total = 0;
        total += state.merge(&peer_one).completed.len();
        total += state.merge(&peer_two).completed.len();
        // Replays of the same states complete nothing further.
        total += state.merge(&peer_one).completed.len();
        total += state.merge(&peer_two).completed.len();
        assert_eq!(total, 1);
    }

    #[test]
    fn difference_keeps_only_unseen_signatures() {
        let mut ours = MstState::empty(completer());
        let mut a = batch("a@dom", 3, 5);
        a.add_signature(0, sig(1));
        a.add_signature(0, sig(2));
        ours.insert(a);

        let mut theirs = MstState::empty(completer());
        let mut b = batch("a@dom", 3, 5);
        b.add_signature(0, sig(2));
        theirs.insert(b);

        let diff = ours.difference(&theirs);
        let batches = diff.batches();
        assert_eq!(batches.len(), 1);
        let keys: Vec<_> = batches[0].signatories(0);
        assert_eq!(keys, vec![PublicKey([1u8; 32])]);

        // Equal states differ by nothing.
        assert!(ours.difference(&ours).is_empty());
    }

    #[test]
    fn expiry_removes_old_batches() {
        let mut state = MstState::empty(completer());
        let mut old = batch("a@dom", 2, 100);
        old.add_signature(0, sig(1));
        state.insert(old);
        let mut young = batch("b@dom", 2, 5000);
        young.add_signature(0, sig(2));
        state.insert(young);

        // TTL is 1000: the batch created at 100 dies at 1101.
        assert!(state.erase_expired(1000).is_empty());
        let expired = state.erase_expired(1200);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].max_created_time(), 100);
        assert_eq!(state.batches().len(), 1);
    }
}
