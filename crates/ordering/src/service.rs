// Path: crates/ordering/src/service.rs
//! The on-demand ordering service.
//!
//! State per round: a FIFO of admitted batches, the ring of prepared
//! proposals (capacity `proposal_limit`), and the replay filter consulted
//! before admission. The service is passive; peers pull proposals through
//! the gate.

use meridian_api::ordering::OnDemandOrderingService;
use meridian_api::state::TxPresenceCache;
use meridian_api::sync::SynchronizationOutcome;
use meridian_types::app::{current_time_ms, Proposal, Round, TransactionBatch};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

struct Inner {
    /// Rounds with a packed proposal, oldest first.
    packed_rounds: VecDeque<Round>,
    proposals: BTreeMap<Round, Proposal>,
    /// Admitted batches waiting to be packed, keyed by the round they
    /// were submitted for.
    current_batches: BTreeMap<Round, VecDeque<TransactionBatch>>,
}

/// The on-demand ordering service implementation.
pub struct OnDemandOrderingServiceImpl {
    transaction_limit: usize,
    proposal_limit: usize,
    tx_cache: Arc<dyn TxPresenceCache>,
    inner: Mutex<Inner>,
}

impl OnDemandOrderingServiceImpl {
    /// Creates a service bounded by `transaction_limit` transactions per
    /// proposal and `proposal_limit` retained proposals.
    pub fn new(
        transaction_limit: usize,
        proposal_limit: usize,
        tx_cache: Arc<dyn TxPresenceCache>,
    ) -> Self {
        Self {
            transaction_limit,
            proposal_limit,
            tx_cache,
            inner: Mutex::new(Inner {
                packed_rounds: VecDeque::new(),
                proposals: BTreeMap::new(),
                current_batches: BTreeMap::new(),
            }),
        }
    }

    /// Packs the proposal for `round` from every batch admitted for it or
    /// for an earlier round. Whole batches only; a batch that would push
    /// the proposal over the transaction limit is deferred, together with
    /// everything behind it, to whichever round is packed next.
    fn pack_proposal(&self, inner: &mut Inner, round: Round) {
        let mut pending: VecDeque<TransactionBatch> = VecDeque::new();
        let stale: Vec<Round> = inner
            .current_batches
            .range(..=round)
            .map(|(r, _)| *r)
            .collect();
        for r in stale {
            if let Some(queue) = inner.current_batches.remove(&r) {
                pending.extend(queue);
            }
        }

        let mut transactions = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut deferred: VecDeque<TransactionBatch> = VecDeque::new();
        while let Some(batch) = pending.pop_front() {
            // Proposer rotation re-propagates batches every round; equal
            // copies meet here and only the first one is packed.
            if batch.transactions.iter().any(|tx| seen.contains(&tx.hash())) {
                continue;
            }
            if transactions.len() + batch.transactions.len() > self.transaction_limit {
                deferred.push_back(batch);
                break;
            }
            seen.extend(batch.transactions.iter().map(|tx| tx.hash()));
            transactions.extend(batch.transactions);
        }
        deferred.extend(pending);
        // Deferred batches wait under this round's key and are migrated
        // forward on the next pack.
        if !deferred.is_empty() {
            inner.current_batches.insert(round, deferred);
        }

        if transactions.is_empty() {
            debug!(round = %round, "no batches; nothing packed");
            return;
        }

        let proposal = Proposal {
            height: round.block_round,
            created_time: current_time_ms(),
            transactions,
        };
        info!(
            round = %round,
            transactions = proposal.transactions.len(),
            "proposal packed"
        );
        inner.proposals.insert(round, proposal);
        inner.packed_rounds.push_back(round);
    }

    /// Evicts the oldest packed proposals beyond the retention ring.
    fn try_erase(&self, inner: &mut Inner) {
        while inner.packed_rounds.len() > self.proposal_limit {
            if let Some(oldest) = inner.packed_rounds.pop_front() {
                inner.proposals.remove(&oldest);
                debug!(round = %oldest, "stale proposal erased");
            }
        }
    }
}

impl OnDemandOrderingService for OnDemandOrderingServiceImpl {
    fn on_batches(&self, round: Round, batches: Vec<TransactionBatch>) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        for batch in batches {
            match self.tx_cache.batch_already_processed(&batch) {
                Ok(true) => {
                    warn!(
                        reduced = %batch.reduced_hash(),
                        "batch dropped: already present in the ledger"
                    );
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "replay filter unavailable; batch dropped");
                    continue;
                }
            }
            inner
                .current_batches
                .entry(round)
                .or_default()
                .push_back(batch);
        }
    }

    fn on_collaboration_outcome(&self, completed_round: Round, outcome: SynchronizationOutcome) {
        let next = match outcome {
            SynchronizationOutcome::Commit => completed_round.next_on_commit(),
            SynchronizationOutcome::Reject | SynchronizationOutcome::Nothing => {
                completed_round.next_on_reject()
            }
        };
        debug!(completed = %completed_round, next = %next, "collaboration outcome");

        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.pack_proposal(&mut inner, next);
        self.try_erase(&mut inner);
    }

    fn on_request_proposal(&self, round: Round) -> Option<Proposal> {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.proposals.get(&round).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_api::state::{TxPresence, TxPresenceCache};
    use meridian_types::app::{Hash, Transaction, TransactionPayload};
    use meridian_types::error::StorageError;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeCache {
        present: StdMutex<HashSet<Hash>>,
    }

    impl TxPresenceCache for FakeCache {
        fn check(&self, hash: &Hash) -> Result<TxPresence, StorageError> {
            Ok(if self.present.lock().unwrap().contains(hash) {
                TxPresence::Committed(1)
            } else {
                TxPresence::Missing
            })
        }
    }

    fn batch_of(count: usize, seed: u64) -> TransactionBatch {
        let txs = (0..count)
            .map(|i| {
                Transaction::new(TransactionPayload {
                    creator_account_id: "alice@wonderland".parse().unwrap(),
                    created_time: seed * 1000 + i as u64,
                    quorum: 1,
                    commands: vec![],
                })
            })
            .collect();
        TransactionBatch::new(txs)
    }

    fn service(limit: usize) -> OnDemandOrderingServiceImpl {
        OnDemandOrderingServiceImpl::new(limit, 3, Arc::new(FakeCache::default()))
    }

    #[test]
    fn proposal_is_packed_for_the_next_round() {
        let service = service(10);
        let round = Round::initial();
        service.on_batches(round, vec![batch_of(2, 1)]);

        // Round (2,1) completes with nothing; next is (2,2), and batches
        // admitted for (2,1) ride forward into it.
        service.on_collaboration_outcome(round, SynchronizationOutcome::Nothing);
        assert!(service.on_request_proposal(round).is_none());

        let packed = service
            .on_request_proposal(round.next_on_reject())
            .expect("proposal for (2,2)");
        assert_eq!(packed.transactions.len(), 2);
        assert_eq!(packed.height, 2);
    }

    #[test]
    fn batches_admitted_for_the_packed_round_are_included() {
        let service = service(10);
        let completed = Round::initial();
        let next = completed.next_on_reject();
        service.on_batches(next, vec![batch_of(3, 1)]);
        service.on_collaboration_outcome(completed, SynchronizationOutcome::Nothing);

        let proposal = service.on_request_proposal(next).expect("packed");
        assert_eq!(proposal.transactions.len(), 3);
    }

    #[test]
    fn whole_batches_are_deferred_at_the_cap() {
        let service = service(4);
        let completed = Round::initial();
        let next = completed.next_on_reject();
        service.on_batches(next, vec![batch_of(3, 1), batch_of(3, 2), batch_of(1, 3)]);
        service.on_collaboration_outcome(completed, SynchronizationOutcome::Nothing);

        // Only the first batch fits whole: 3 <= 4, 3+3 > 4.
        let proposal = service.on_request_proposal(next).expect("packed");
        assert_eq!(proposal.transactions.len(), 3);

        // The deferred batches ride into the following round.
        service.on_collaboration_outcome(next, SynchronizationOutcome::Nothing);
        let following = service
            .on_request_proposal(next.next_on_reject())
            .expect("packed follow-up");
        assert_eq!(following.transactions.len(), 4);
    }

    #[test]
    fn replayed_transactions_are_refused() {
        let cache = Arc::new(FakeCache::default());
        let service = OnDemandOrderingServiceImpl::new(10, 3, cache.clone());

        let replayed = batch_of(1, 1);
        cache
            .present
            .lock()
            .unwrap()
            .insert(replayed.transactions[0].hash());

        let completed = Round::initial();
        let next = completed.next_on_reject();
        service.on_batches(next, vec![replayed, batch_of(1, 2)]);
        service.on_collaboration_outcome(completed, SynchronizationOutcome::Nothing);

        let proposal = service.on_request_proposal(next).expect("packed");
        assert_eq!(proposal.transactions.len(), 1);
        assert_eq!(proposal.transactions[0].payload.created_time, 2000);
    }

    #[test]
    fn old_proposals_fall_out_of_the_ring() {
        let service = service(10);
        let mut round = Round::initial();
        let first_packed = round.next_on_reject();

        for _ in 0..5 {
            service.on_batches(round.next_on_reject(), vec![batch_of(1, round.reject_round as u64)]);
            service.on_collaboration_outcome(round, SynchronizationOutcome::Nothing);
            round = round.next_on_reject();
        }

        // Five proposals packed, ring keeps three: the first two are gone.
        assert!(service.on_request_proposal(first_packed).is_none());
        assert!(service.on_request_proposal(round).is_some());
    }

    #[test]
    fn commit_advances_the_block_round() {
        let service = service(10);
        let completed = Round::new(2, 4);
        service.on_batches(Round::new(3, 1), vec![batch_of(1, 9)]);
        service.on_collaboration_outcome(completed, SynchronizationOutcome::Commit);

        let proposal = service.on_request_proposal(Round::new(3, 1)).expect("packed");
        assert_eq!(proposal.height, 3);
    }
}
