// Path: crates/sync/src/synchronizer.rs
//! Consensus-outcome application and recovery.
//!
//! `PairValid` applies the locally built block; `VoteOther` downloads the
//! agreed chain from the committing voters, rotating through them until a
//! valid chain lands — the round cannot progress without the committed
//! block, so there is no give-up path. Reject and none outcomes only emit
//! an event.

use crate::loader::BlockLoader;
use meridian_api::consensus::{CommitInfo, GateOutcome};
use meridian_api::state::{MutableFactory, MutableStorage, PeerQuery};
use meridian_api::sync::{SynchronizationEvent, SynchronizationOutcome};
use meridian_types::app::Round;
use meridian_validation::ChainValidator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Applies consensus outcomes to storage and emits synchronization
/// events.
pub struct Synchronizer {
    chain_validator: ChainValidator,
    mutable_factory: Arc<dyn MutableFactory>,
    peer_query: Arc<dyn PeerQuery>,
    block_loader: BlockLoader,
    events_tx: broadcast::Sender<SynchronizationEvent>,
}

impl Synchronizer {
    /// Creates a synchronizer; every outcome produces exactly one event
    /// on the broadcast channel.
    pub fn new(
        mutable_factory: Arc<dyn MutableFactory>,
        peer_query: Arc<dyn PeerQuery>,
        block_loader: BlockLoader,
        events_tx: broadcast::Sender<SynchronizationEvent>,
    ) -> Self {
        Self {
            chain_validator: ChainValidator::new(),
            mutable_factory,
            peer_query,
            block_loader,
            events_tx,
        }
    }

    /// Subscribes to synchronization events.
    pub fn subscribe(&self) -> broadcast::Receiver<SynchronizationEvent> {
        self.events_tx.subscribe()
    }

    /// Processes one consensus outcome.
    pub async fn process_outcome(&self, outcome: GateOutcome) {
        match outcome {
            GateOutcome::PairValid { block, round } => self.process_next(block, round).await,
            GateOutcome::VoteOther { commit, round } => {
                self.process_different(commit, round).await
            }
            GateOutcome::ProposalReject { round } | GateOutcome::BlockReject { round } => {
                self.emit(SynchronizationEvent {
                    blocks: Vec::new(),
                    outcome: SynchronizationOutcome::Reject,
                    round,
                });
            }
            GateOutcome::AgreementOnNone { round } => {
                self.emit(SynchronizationEvent {
                    blocks: Vec::new(),
                    outcome: SynchronizationOutcome::Nothing,
                    round,
                });
            }
        }
    }

    /// Commits the block this node voted for.
    async fn process_next(&self, block: meridian_types::app::Block, round: Round) {
        let mut storage = match self.mutable_factory.create_mutable_storage() {
            Ok(storage) => storage,
            Err(e) => {
                // Retried implicitly on the next round.
                error!(error = %e, "could not open mutable storage; outcome aborted");
                return;
            }
        };

        // This block passed our own stateful validation and carries the
        // cluster's supermajority: failure to apply or commit it means
        // the ledger cannot be allowed to advance at all.
        if let Err(e) = storage.apply(&block) {
            error!(height = block.height(), error = %e, "applying the agreed block failed");
            panic!("ledger cannot advance past a partially applied block");
        }
        let blocks = match storage.commit() {
            Ok(blocks) => blocks,
            Err(e) => {
                error!(error = %e, "committing the agreed block failed");
                panic!("ledger cannot advance past a partially committed block");
            }
        };

        info!(round = %round, height = blocks.last().map(|b| b.height()).unwrap_or(0), "committed");
        self.emit(SynchronizationEvent {
            blocks,
            outcome: SynchronizationOutcome::Commit,
            round,
        });
    }

    /// Downloads and applies the chain the cluster committed while this
    /// node voted differently.
    async fn process_different(&self, commit: CommitInfo, round: Round) {
        loop {
            for voter in &commit.voters {
                let Ok(peers) = self.peer_query.ledger_peers() else {
                    continue;
                };
                let Some(peer) = peers.iter().find(|p| p.public_key == *voter).cloned() else {
                    continue;
                };

                let mut storage = match self.mutable_factory.create_mutable_storage() {
                    Ok(storage) => storage,
                    Err(e) => {
                        error!(error = %e, "could not open mutable storage; outcome aborted");
                        return;
                    }
                };

                let from_height = storage.top_height() + 1;
                let chain = self.block_loader.retrieve_blocks(&peer, from_height).await;
                if chain.is_empty() {
                    info!(peer = %peer.public_key, "downloaded an empty chain");
                    continue;
                }
                let terminal_matches = chain
                    .last()
                    .map(|b| b.hash() == commit.block_hash)
                    .unwrap_or(false);
                if !terminal_matches {
                    warn!(peer = %peer.public_key, "chain does not end in the committed block");
                    continue;
                }
                if !self
                    .chain_validator
                    .validate_and_apply(&chain, storage.as_mut())
                {
                    warn!(peer = %peer.public_key, "downloaded chain failed validation");
                    continue;
                }

                match storage.commit() {
                    Ok(blocks) => {
                        info!(
                            round = %round,
                            height = blocks.last().map(|b| b.height()).unwrap_or(0),
                            "synchronized to the committed chain"
                        );
                        self.emit(SynchronizationEvent {
                            blocks,
                            outcome: SynchronizationOutcome::Commit,
                            round,
                        });
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, "committing the downloaded chain failed");
                        panic!("ledger cannot advance past a partially committed chain");
                    }
                }
            }
            // Every voter failed this sweep; keep rotating.
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn emit(&self, event: SynchronizationEvent) {
        if self.events_tx.send(event).is_err() {
            warn!("no synchronization event subscribers");
        }
    }
}
