// Path: crates/node/src/node.rs
//! Node construction, task wiring and inbound handlers.
//!
//! Pipeline: ordering gate -> simulator -> consensus gate -> YAC ->
//! synchronizer -> back to the ordering gate through the
//! synchronization-event broadcast. Each arrow is a channel; each stage
//! is a task.

use crate::status::StatusBus;
use meridian_api::consensus::CandidateBlock;
use meridian_api::network::{BlockLoaderNetwork, MstNetwork, OrderingNetwork, YacNetwork};
use meridian_api::ordering::{OnDemandOrderingService, RoundProposal};
use meridian_api::state::BlockQuery;
use meridian_api::sync::SynchronizationEvent;
use meridian_consensus::{Answer, ConsensusResultCache, Yac, YacGate};
use meridian_crypto::KeyPair;
use meridian_mst::{spawn_mst_processor, DefaultCompleter, MstProcessorHandle};
use meridian_ordering::{OnDemandOrderingServiceImpl, OrderingGate};
use meridian_storage::Storage;
use meridian_sync::{BlockLoader, Synchronizer};
use meridian_types::app::{
    Block, BlockResponse, Hash, Peer, Proposal, Query, QueryResponse, Round, Transaction,
    TransactionBatch, TxStatus, VoteMessage,
};
use meridian_types::config::NodeConfig;
use meridian_types::error::ValidationError;
use meridian_validation::Simulator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The transports a node speaks through; in-process for tests and
/// single-peer deployments, wire-backed otherwise.
pub struct NetworkStack {
    /// Transport to peers' ordering services.
    pub ordering: Arc<dyn OrderingNetwork>,
    /// Transport for consensus votes.
    pub yac: Arc<dyn YacNetwork>,
    /// Transport for multi-signature gossip.
    pub mst: Arc<dyn MstNetwork>,
    /// Transport to peers' block loader services.
    pub loader: Arc<dyn BlockLoaderNetwork>,
}

/// A running ledger node.
pub struct Node {
    key_pair: KeyPair,
    own_peer: Peer,
    storage: Arc<Storage>,
    status_bus: Arc<StatusBus>,
    ordering_service: Arc<OnDemandOrderingServiceImpl>,
    ordering_gate: Arc<OrderingGate>,
    yac: Arc<Yac>,
    result_cache: Arc<ConsensusResultCache>,
    mst: Option<MstProcessorHandle>,
    sync_events: broadcast::Sender<SynchronizationEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Builds and starts a node over an initialized ledger (genesis
    /// already committed). Spawns the pipeline tasks; call
    /// [`kick_off`](Node::kick_off) once the transports are attached.
    pub async fn start(
        config: &NodeConfig,
        key_pair: KeyPair,
        storage: Arc<Storage>,
        networks: NetworkStack,
    ) -> Arc<Node> {
        let own_key = key_pair.public_key();
        let own_peer = meridian_api::state::PeerQuery::ledger_peers(storage.as_ref())
            .ok()
            .and_then(|peers| peers.into_iter().find(|p| p.public_key == own_key))
            .unwrap_or_else(|| Peer {
                address: format!("127.0.0.1:{}", config.internal_port),
                public_key: own_key,
            });

        let status_bus = Arc::new(StatusBus::new());
        let result_cache = Arc::new(ConsensusResultCache::new());

        // Channels between the pipeline stages.
        let (proposal_tx, mut proposal_rx) = mpsc::channel::<RoundProposal>(8);
        let (answer_tx, mut answer_rx) = mpsc::channel::<Answer>(8);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(8);
        let (sync_events, _) = broadcast::channel::<SynchronizationEvent>(32);

        let ordering_service = Arc::new(OnDemandOrderingServiceImpl::new(
            config.max_proposal_size,
            config.proposal_limit,
            storage.clone(),
        ));

        let initial_round = Round::new(
            storage.top_height().unwrap_or(0).max(1) + 1,
            Round::FIRST_REJECT,
        );
        let ordering_gate = Arc::new(OrderingGate::new(
            ordering_service.clone(),
            networks.ordering.clone(),
            storage.clone(),
            own_peer.clone(),
            initial_round,
            proposal_tx,
            Duration::from_millis(config.proposal_delay),
        ));

        let yac = Yac::new(
            networks.yac.clone(),
            key_pair.clone(),
            Duration::from_millis(config.vote_delay),
            answer_tx,
        );
        let yac_gate = Arc::new(YacGate::new(
            yac.clone(),
            storage.clone(),
            result_cache.clone(),
            outcome_tx,
        ));

        let block_loader = BlockLoader::new(networks.loader.clone(), result_cache.clone());
        let synchronizer = Arc::new(Synchronizer::new(
            storage.clone(),
            storage.clone(),
            block_loader,
            sync_events.clone(),
        ));

        let simulator = Simulator::new(storage.clone(), storage.clone(), key_pair.clone());

        let mut tasks = Vec::new();

        // Simulator stage: proposals in, candidate votes out.
        {
            let gate = yac_gate.clone();
            let status_bus = status_bus.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(input) = proposal_rx.recv().await {
                    let Some(candidate) = simulator.process_proposal(&input) else {
                        continue;
                    };
                    publish_rejections(&status_bus, &candidate);
                    gate.vote_for(candidate);
                }
            }));
        }

        // Consensus translation stage: certificates in, outcomes out.
        {
            let gate = yac_gate.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(answer) = answer_rx.recv().await {
                    gate.on_answer(answer).await;
                }
            }));
        }

        // Synchronizer stage: outcomes in, commits and events out.
        {
            let synchronizer = synchronizer.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(outcome) = outcome_rx.recv().await {
                    synchronizer.process_outcome(outcome).await;
                }
            }));
        }

        // Round clock: synchronization events drive the ordering gate and
        // the status pipeline.
        {
            let gate = ordering_gate.clone();
            let status_bus = status_bus.clone();
            let mut events = sync_events.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            publish_commit_statuses(&status_bus, &event);
                            gate.on_sync_event(event).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "round clock lagged behind sync events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        // Multi-signature aggregation, if enabled.
        let mst = if config.mst_enable {
            let (handle, streams, task) = spawn_mst_processor(
                own_key,
                Arc::new(DefaultCompleter::new(config.mst_expiration_time)),
                networks.mst.clone(),
                storage.clone(),
                Duration::from_millis(config.mst_gossip_period),
                config.mst_gossip_amount,
            );
            tasks.push(task);
            let meridian_mst::MstStreams {
                mut prepared_batches,
                mut expired_batches,
                mut state_updates,
            } = streams;

            tasks.push(tokio::spawn(async move {
                while let Some(pending) = state_updates.recv().await {
                    tracing::debug!(pending, "mst state updated");
                }
            }));

            let gate = ordering_gate.clone();
            let status_bus_prepared = status_bus.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(batch) = prepared_batches.recv().await {
                    for tx in &batch.transactions {
                        status_bus_prepared
                            .publish(tx.hash(), TxStatus::EnoughSignaturesCollected);
                    }
                    gate.propagate_batch(batch).await;
                }
            }));

            let status_bus_expired = status_bus.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(batch) = expired_batches.recv().await {
                    for tx in &batch.transactions {
                        status_bus_expired.publish(tx.hash(), TxStatus::MstExpired);
                    }
                }
            }));

            Some(handle)
        } else {
            None
        };

        let node = Arc::new(Node {
            key_pair,
            own_peer,
            storage,
            status_bus,
            ordering_service,
            ordering_gate: ordering_gate.clone(),
            yac,
            result_cache,
            mst,
            sync_events,
            tasks,
        });

        info!(peer = %node.own_peer.public_key, "node started");
        node
    }

    /// Kicks off the first round. Call once the node is reachable on its
    /// transports; votes sent before that are lost on the floor.
    pub async fn kick_off(&self) {
        self.ordering_gate.start().await;
    }

    /// Stops every pipeline task.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    /// This node's peer identity.
    pub fn own_peer(&self) -> &Peer {
        &self.own_peer
    }

    /// The node's keypair.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Subscribes to synchronization events.
    pub fn sync_events(&self) -> broadcast::Receiver<SynchronizationEvent> {
        self.sync_events.subscribe()
    }

    /// The round the node currently works on.
    pub async fn current_round(&self) -> Round {
        self.ordering_gate.current_round().await
    }

    /// Height of the last committed block.
    pub fn top_height(&self) -> u64 {
        self.storage.top_height().unwrap_or(0)
    }

    // ---- client surface ------------------------------------------------

    /// Accepts a client transaction: fully signed ones go to ordering,
    /// partially signed ones to multi-signature aggregation.
    pub async fn submit_transaction(&self, tx: Transaction) {
        let batch = TransactionBatch::lone(tx);
        self.submit_batch(batch).await;
    }

    /// Accepts a client batch.
    pub async fn submit_batch(&self, batch: TransactionBatch) {
        if batch.is_complete() {
            for tx in &batch.transactions {
                self.status_bus
                    .publish(tx.hash(), TxStatus::EnoughSignaturesCollected);
            }
            self.ordering_gate.propagate_batch(batch).await;
            return;
        }
        match &self.mst {
            Some(mst) => mst.propagate_batch(batch).await,
            None => {
                warn!("partially signed batch dropped: mst is disabled");
            }
        }
    }

    /// The latest known status of a submitted transaction.
    pub fn tx_status(&self, hash: &Hash) -> Option<TxStatus> {
        self.status_bus.get(hash)
    }

    /// Subscribes to transaction status transitions.
    pub fn status_updates(&self) -> broadcast::Receiver<(Hash, TxStatus)> {
        self.status_bus.subscribe()
    }

    /// Answers a client query against committed state.
    pub fn get_query_response(&self, query: &Query) -> QueryResponse {
        meridian_storage::query_executor::execute_query(&self.storage, query)
    }

    /// Streams committed blocks: the chain so far, then every new commit
    /// as it lands. The stream ends when the receiver is dropped.
    pub fn get_block_stream(&self) -> mpsc::Receiver<BlockResponse> {
        let (tx, rx) = mpsc::channel(16);
        let storage = self.storage.clone();
        let mut events = self.sync_events.subscribe();
        tokio::spawn(async move {
            let mut next_height = 1u64;
            // Backfill the committed chain, then follow live commits;
            // after a lag, the backfill loop re-reads what was missed.
            loop {
                while let Ok(Some(block)) = storage.block(next_height) {
                    if tx.send(BlockResponse { block }).await.is_err() {
                        return;
                    }
                    next_height += 1;
                }
                match events.recv().await {
                    Ok(event) => {
                        for block in event.blocks {
                            if block.height() < next_height {
                                continue;
                            }
                            next_height = block.height() + 1;
                            if tx.send(BlockResponse { block }).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        rx
    }

    // ---- inbound peer surface ------------------------------------------

    /// Inbound consensus vote state.
    pub async fn handle_yac_state(&self, state: Vec<VoteMessage>) {
        self.yac.on_state(state).await;
    }

    /// Inbound batches for this node's ordering service.
    pub fn handle_on_batches(&self, round: Round, batches: Vec<TransactionBatch>) {
        self.ordering_service.on_batches(round, batches);
    }

    /// Inbound proposal request against this node's ordering service.
    pub fn handle_request_proposal(&self, round: Round) -> Option<Proposal> {
        self.ordering_service.on_request_proposal(round)
    }

    /// Inbound multi-signature state from a peer.
    pub async fn handle_mst_state(&self, from: Peer, batches: Vec<TransactionBatch>) {
        match &self.mst {
            Some(mst) => mst.on_peer_state(from, batches).await,
            None => warn!("mst state received while mst is disabled"),
        }
    }

    /// Serves one block by hash: the consensus result cache first, then
    /// committed storage.
    pub fn handle_retrieve_block(&self, hash: Hash) -> Option<Block> {
        self.result_cache
            .get(&hash)
            .or_else(|| self.storage.block_by_hash(&hash).ok().flatten())
    }

    /// Serves the committed chain from `from_height` upward.
    pub fn handle_retrieve_blocks(&self, from_height: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut height = from_height;
        while let Ok(Some(block)) = self.storage.block(height) {
            blocks.push(block);
            height += 1;
        }
        blocks
    }
}

#[async_trait::async_trait]
impl meridian_api::query::QueryService for Node {
    async fn get_query_response(&self, query: Query) -> QueryResponse {
        Node::get_query_response(self, &query)
    }

    async fn get_block_stream(&self) -> mpsc::Receiver<BlockResponse> {
        Node::get_block_stream(self)
    }
}

fn publish_rejections(status_bus: &StatusBus, candidate: &CandidateBlock) {
    for rejection in &candidate.rejected {
        let code = match &rejection.error {
            ValidationError::CommandFailed { error, .. } => error.error_code,
            _ => 0,
        };
        status_bus.publish(rejection.tx_hash, TxStatus::StatefulValidationFailed(code));
    }
}

fn publish_commit_statuses(status_bus: &StatusBus, event: &SynchronizationEvent) {
    for block in &event.blocks {
        for tx in &block.payload.transactions {
            status_bus.publish(tx.hash(), TxStatus::Committed);
        }
        for rejected in &block.payload.rejected_transactions_hashes {
            status_bus.publish(*rejected, TxStatus::Rejected);
        }
    }
}
