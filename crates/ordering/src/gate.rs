// Path: crates/ordering/src/gate.rs
//! The ordering gate.
//!
//! Holds the current round under a readers-writer lock: synchronization
//! events take the writer side and advance the round, batch propagation
//! takes the reader side. On every event the gate asks the round's
//! elected ordering peer for the packed proposal, synthesizes an empty
//! one if nothing comes back, and feeds the result into the simulator
//! pipeline.

use meridian_api::network::OrderingNetwork;
use meridian_api::ordering::{OnDemandOrderingService, RoundProposal};
use meridian_api::state::PeerQuery;
use meridian_api::sync::{SynchronizationEvent, SynchronizationOutcome};
use meridian_types::app::{current_time_ms, Peer, Proposal, Round, TransactionBatch};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex, RwLock};
use tracing::{debug, info, warn};

/// The ordering gate.
pub struct OrderingGate {
    service: Arc<dyn OnDemandOrderingService>,
    network: Arc<dyn OrderingNetwork>,
    peer_query: Arc<dyn PeerQuery>,
    own_peer: Peer,
    current_round: RwLock<Round>,
    proposal_tx: mpsc::Sender<RoundProposal>,
    proposal_delay: Duration,
    /// Batches this node propagated that are not yet in the ledger; the
    /// elected ordering peer changes per round, so they are re-sent to
    /// the new one on every round transition.
    batch_cache: TokioMutex<VecDeque<TransactionBatch>>,
}

const BATCH_CACHE_LIMIT: usize = 10_000;

impl OrderingGate {
    /// Creates a gate starting at `initial_round`, emitting round
    /// proposals into `proposal_tx`.
    pub fn new(
        service: Arc<dyn OnDemandOrderingService>,
        network: Arc<dyn OrderingNetwork>,
        peer_query: Arc<dyn PeerQuery>,
        own_peer: Peer,
        initial_round: Round,
        proposal_tx: mpsc::Sender<RoundProposal>,
        proposal_delay: Duration,
    ) -> Self {
        Self {
            service,
            network,
            peer_query,
            own_peer,
            current_round: RwLock::new(initial_round),
            proposal_tx,
            proposal_delay,
            batch_cache: TokioMutex::new(VecDeque::new()),
        }
    }

    /// The round the gate currently works on.
    pub async fn current_round(&self) -> Round {
        *self.current_round.read().await
    }

    /// Kicks off the first round after startup.
    pub async fn start(&self) {
        let round = self.current_round().await;
        info!(round = %round, "ordering gate started");
        self.request_and_emit(round).await;
    }

    /// Advances the round per the synchronizer's outcome and emits the
    /// proposal for the new round.
    pub async fn on_sync_event(&self, event: SynchronizationEvent) {
        let new_round = {
            let mut guard = self.current_round.write().await;
            *guard = match event.outcome {
                SynchronizationOutcome::Commit => {
                    let top = event
                        .blocks
                        .last()
                        .map(|b| b.height())
                        .unwrap_or(guard.block_round);
                    Round::new(top + 1, Round::FIRST_REJECT)
                }
                SynchronizationOutcome::Reject | SynchronizationOutcome::Nothing => {
                    guard.next_on_reject()
                }
            };
            *guard
        };
        debug!(completed = %event.round, next = %new_round, "round advanced");

        self.service
            .on_collaboration_outcome(event.round, event.outcome);
        self.refresh_batch_cache(&event, new_round).await;

        if event.outcome != SynchronizationOutcome::Commit {
            // Pace empty and rejected rounds so an idle cluster does not
            // spin through reject ordinals.
            tokio::time::sleep(self.proposal_delay).await;
        }
        self.request_and_emit(new_round).await;
    }

    /// Forwards a client batch to the elected ordering peer for the
    /// current round and caches it for re-propagation on later rounds.
    pub async fn propagate_batch(&self, batch: TransactionBatch) {
        {
            let mut cache = self.batch_cache.lock().await;
            if !cache.iter().any(|b| *b == batch) {
                cache.push_back(batch.clone());
                if cache.len() > BATCH_CACHE_LIMIT {
                    cache.pop_front();
                }
            }
        }
        let round = *self.current_round.read().await;
        self.send_batches(round, vec![batch]).await;
    }

    /// Drops cached batches the committed blocks settled, then re-sends
    /// the remainder to the new round's elected ordering peer.
    async fn refresh_batch_cache(&self, event: &SynchronizationEvent, new_round: Round) {
        let mut cache = self.batch_cache.lock().await;
        if !event.blocks.is_empty() {
            let mut settled = std::collections::HashSet::new();
            for block in &event.blocks {
                settled.extend(block.payload.transactions.iter().map(|tx| tx.hash()));
                settled.extend(block.payload.rejected_transactions_hashes.iter().copied());
            }
            cache.retain(|batch| {
                !batch
                    .transactions
                    .iter()
                    .any(|tx| settled.contains(&tx.hash()))
            });
        }
        let pending: Vec<TransactionBatch> = cache.iter().cloned().collect();
        drop(cache);
        if !pending.is_empty() {
            self.send_batches(new_round, pending).await;
        }
    }

    async fn send_batches(&self, round: Round, batches: Vec<TransactionBatch>) {
        let elected = self.elected_peer(round);
        if elected.public_key == self.own_peer.public_key {
            self.service.on_batches(round, batches);
            return;
        }
        if let Err(e) = self.network.on_batches(&elected, round, batches).await {
            warn!(peer = %elected.public_key, error = %e, "batch propagation failed");
        }
    }

    /// The ordering peer elected for `round` under proposer rotation;
    /// peers are ordered by public key.
    fn elected_peer(&self, round: Round) -> Peer {
        let mut peers = match self.peer_query.ledger_peers() {
            Ok(peers) if !peers.is_empty() => peers,
            Ok(_) => return self.own_peer.clone(),
            Err(e) => {
                warn!(error = %e, "could not read ledger peers; using self");
                return self.own_peer.clone();
            }
        };
        peers.sort();
        let index =
            (round.block_round.wrapping_add(round.reject_round as u64) as usize) % peers.len();
        peers
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.own_peer.clone())
    }

    async fn request_and_emit(&self, round: Round) {
        let elected = self.elected_peer(round);
        let requested = if elected.public_key == self.own_peer.public_key {
            self.service.on_request_proposal(round)
        } else {
            match self.network.on_request_proposal(&elected, round).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    warn!(peer = %elected.public_key, error = %e, "proposal request failed");
                    None
                }
            }
        };

        let proposal = requested.unwrap_or_else(|| {
            debug!(round = %round, "synthesizing empty proposal");
            Proposal::empty(round.block_round, current_time_ms())
        });
        if self
            .proposal_tx
            .send(RoundProposal { round, proposal })
            .await
            .is_err()
        {
            warn!("simulator pipeline is gone; proposal dropped");
        }
    }
}
