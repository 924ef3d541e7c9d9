// Path: crates/mst/src/processor.rs
//! The MST processor task.
//!
//! The state is owned by one task; batch submissions and inbound peer
//! states are serialized through its command channel. Every gossip tick
//! checks expiry, then pushes the current state to peers picked by the
//! propagation strategy. Send failures are logged and ignored: the batch
//! stays local until completed, expired, or superseded by a fresher peer
//! state.

use crate::gossip::GossipPropagationStrategy;
use crate::state::{Completer, MstState};
use meridian_api::network::MstNetwork;
use meridian_api::state::PeerQuery;
use meridian_types::app::{current_time_ms, Peer, PublicKey, TransactionBatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum MstCommand {
    Propagate(TransactionBatch),
    PeerState {
        from: Peer,
        batches: Vec<TransactionBatch>,
    },
}

/// Cloneable handle feeding the processor task.
#[derive(Clone)]
pub struct MstProcessorHandle {
    tx: mpsc::Sender<MstCommand>,
}

impl MstProcessorHandle {
    /// Submits a batch for signature collection.
    pub async fn propagate_batch(&self, batch: TransactionBatch) {
        if self.tx.send(MstCommand::Propagate(batch)).await.is_err() {
            warn!("mst processor task is gone; batch dropped");
        }
    }

    /// Feeds a peer's state message into the processor.
    pub async fn on_peer_state(&self, from: Peer, batches: Vec<TransactionBatch>) {
        if self
            .tx
            .send(MstCommand::PeerState { from, batches })
            .await
            .is_err()
        {
            warn!("mst processor task is gone; peer state dropped");
        }
    }
}

/// The processor's outbound streams.
pub struct MstStreams {
    /// Pending-batch count after every state mutation.
    pub state_updates: mpsc::UnboundedReceiver<usize>,
    /// Batches that reached their signature quorum.
    pub prepared_batches: mpsc::UnboundedReceiver<TransactionBatch>,
    /// Batches that expired before reaching quorum.
    pub expired_batches: mpsc::UnboundedReceiver<TransactionBatch>,
}

struct Processor {
    state: MstState,
    completer: Arc<dyn Completer>,
    network: Arc<dyn MstNetwork>,
    peer_query: Arc<dyn PeerQuery>,
    strategy: GossipPropagationStrategy,
    gossip_amount: usize,
    state_updates: mpsc::UnboundedSender<usize>,
    prepared: mpsc::UnboundedSender<TransactionBatch>,
    expired: mpsc::UnboundedSender<TransactionBatch>,
}

impl Processor {
    fn emit_completed(&self, completed: Vec<TransactionBatch>) {
        for batch in completed {
            info!(reduced = %batch.reduced_hash(), "batch completed");
            let _ = self.prepared.send(batch);
        }
    }

    fn emit_state_update(&self) {
        let _ = self.state_updates.send(self.state.batches().len());
    }

    fn on_propagate(&mut self, batch: TransactionBatch) {
        debug!(reduced = %batch.reduced_hash(), "batch entered mst state");
        let completed = self.state.insert(batch);
        self.emit_completed(completed);
        self.emit_state_update();
    }

    async fn on_peer_state(&mut self, from: Peer, batches: Vec<TransactionBatch>) {
        let incoming = MstState::from_batches(self.completer.clone(), batches);
        let result = self.state.merge(&incoming);
        self.emit_completed(result.completed);
        self.emit_state_update();

        if !result.reciprocal.is_empty() {
            if let Err(e) = self
                .network
                .send_state(&from, result.reciprocal.batches())
                .await
            {
                warn!(peer = %from.public_key, error = %e, "reciprocal mst send failed");
            }
        }
    }

    async fn tick(&mut self) {
        let now = current_time_ms();
        let expired = self.state.erase_expired(now);
        if !expired.is_empty() {
            info!(count = expired.len(), "mst batches expired");
            for batch in expired {
                let _ = self.expired.send(batch);
            }
            self.emit_state_update();
        }

        if self.state.is_empty() {
            return;
        }
        let peers = match self.peer_query.ledger_peers() {
            Ok(peers) => peers,
            Err(e) => {
                warn!(error = %e, "could not read ledger peers for gossip");
                return;
            }
        };
        let batches = self.state.batches();
        for peer in self.strategy.select(&peers, self.gossip_amount) {
            if let Err(e) = self.network.send_state(&peer, batches.clone()).await {
                warn!(peer = %peer.public_key, error = %e, "mst gossip send failed");
            }
        }
    }
}

/// Spawns the MST processor task. Returns the command handle, the
/// outbound streams and the task handle.
pub fn spawn_mst_processor(
    own_key: PublicKey,
    completer: Arc<dyn Completer>,
    network: Arc<dyn MstNetwork>,
    peer_query: Arc<dyn PeerQuery>,
    gossip_period: Duration,
    gossip_amount: usize,
) -> (MstProcessorHandle, MstStreams, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(128);
    let (state_updates_tx, state_updates) = mpsc::unbounded_channel();
    let (prepared_tx, prepared_batches) = mpsc::unbounded_channel();
    let (expired_tx, expired_batches) = mpsc::unbounded_channel();

    let mut processor = Processor {
        state: MstState::empty(completer.clone()),
        completer,
        network,
        peer_query,
        strategy: GossipPropagationStrategy::new(own_key),
        gossip_amount,
        state_updates: state_updates_tx,
        prepared: prepared_tx,
        expired: expired_tx,
    };

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(gossip_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(MstCommand::Propagate(batch)) => processor.on_propagate(batch),
                    Some(MstCommand::PeerState { from, batches }) => {
                        processor.on_peer_state(from, batches).await;
                    }
                    None => break,
                },
                _ = interval.tick() => processor.tick().await,
            }
        }
        debug!("mst processor task stopped");
    });

    (
        MstProcessorHandle { tx },
        MstStreams {
            state_updates,
            prepared_batches,
            expired_batches,
        },
        handle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DefaultCompleter;
    use meridian_api::network::NetworkError;
    use meridian_crypto::KeyPair;
    use meridian_types::app::{Transaction, TransactionPayload};
    use meridian_types::error::StorageError;
    use std::sync::Mutex;

    struct SilentNetwork {
        sent: Mutex<Vec<(PublicKey, usize)>>,
    }

    #[async_trait::async_trait]
    impl MstNetwork for SilentNetwork {
        async fn send_state(
            &self,
            to: &Peer,
            state: Vec<TransactionBatch>,
        ) -> Result<(), NetworkError> {
            self.sent.lock().unwrap().push((to.public_key, state.len()));
            Ok(())
        }
    }

    struct TwoPeers {
        own: PublicKey,
        other: PublicKey,
    }

    impl PeerQuery for TwoPeers {
        fn ledger_peers(&self) -> Result<Vec<Peer>, StorageError> {
            Ok(vec![
                Peer {
                    address: "a:1".into(),
                    public_key: self.own,
                },
                Peer {
                    address: "b:1".into(),
                    public_key: self.other,
                },
            ])
        }
    }

    fn half_signed_batch(pair: &KeyPair) -> TransactionBatch {
        let mut tx = Transaction::new(TransactionPayload {
            creator_account_id: "a@dom".parse().unwrap(),
            created_time: current_time_ms(),
            quorum: 2,
            commands: vec![],
        });
        let hash = tx.hash();
        tx.add_signature(pair.sign_hash(&hash));
        TransactionBatch::new(vec![tx])
    }

    #[tokio::test]
    async fn peer_state_completes_batch_and_emits_prepared_once() {
        let own = KeyPair::generate();
        let other = KeyPair::generate();
        let network = Arc::new(SilentNetwork {
            sent: Mutex::new(vec![]),
        });
        let (handle, mut streams, task) = spawn_mst_processor(
            own.public_key(),
            Arc::new(DefaultCompleter::new(300_000)),
            network.clone(),
            Arc::new(TwoPeers {
                own: own.public_key(),
                other: other.public_key(),
            }),
            Duration::from_secs(3600),
            2,
        );

        let local = half_signed_batch(&own);
        handle.propagate_batch(local.clone()).await;

        // The same batch, carrying only the second signatory's signature.
        let mut remote_tx = local.transactions[0].clone();
        remote_tx.signatures = meridian_types::app::SignatureSet::new();
        let hash = remote_tx.hash();
        remote_tx.add_signature(other.sign_hash(&hash));
        let remote = TransactionBatch::new(vec![remote_tx]);

        let sender = Peer {
            address: "b:1".into(),
            public_key: other.public_key(),
        };
        handle.on_peer_state(sender.clone(), vec![remote.clone()]).await;
        // A replay of the same state must not complete anything again.
        handle.on_peer_state(sender, vec![remote]).await;

        let prepared = streams.prepared_batches.recv().await.unwrap();
        assert_eq!(prepared.transactions[0].signatures.len(), 2);
        // Let the replayed state drain through the task before checking
        // that it completed nothing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(streams.prepared_batches.try_recv().is_err());

        task.abort();
    }
}
