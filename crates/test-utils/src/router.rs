// Path: crates/test-utils/src/router.rs
//! The in-process network router.
//!
//! Every node talks through its own [`Endpoint`], which stamps outbound
//! gossip with the node's identity. Vote and gossip deliveries are
//! queued per receiving node and pumped by a dedicated task, mirroring
//! real transport decoupling (a handler that sends while handling must
//! not recurse into itself). Ordering and block-loader requests are
//! synchronous handler calls.

use async_trait::async_trait;
use meridian_api::network::{
    BlockLoaderNetwork, MstNetwork, NetworkError, OrderingNetwork, YacNetwork,
};
use meridian_node::Node;
use meridian_types::app::{
    Block, Hash, Peer, Proposal, PublicKey, Round, TransactionBatch, VoteMessage,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum Delivery {
    YacState(Vec<VoteMessage>),
    MstState(Peer, Vec<TransactionBatch>),
}

struct Slot {
    node: Arc<Node>,
    inbox: mpsc::Sender<Delivery>,
    pump: JoinHandle<()>,
}

/// Routes inter-peer messages between in-process nodes by public key.
#[derive(Default)]
pub struct InProcessNetwork {
    slots: RwLock<HashMap<PublicKey, Slot>>,
}

impl InProcessNetwork {
    /// Creates an empty router.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The network stack a node with identity `own` speaks through.
    pub fn endpoint(self: &Arc<Self>, own: Peer) -> Arc<Endpoint> {
        Arc::new(Endpoint {
            router: self.clone(),
            own,
        })
    }

    /// Registers a node; inbound deliveries for its key start flowing.
    pub fn register(&self, node: Arc<Node>) {
        let key = node.own_peer().public_key;
        let (inbox, mut rx) = mpsc::channel::<Delivery>(1024);
        let pump_node = node.clone();
        let pump = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match delivery {
                    Delivery::YacState(state) => pump_node.handle_yac_state(state).await,
                    Delivery::MstState(from, batches) => {
                        pump_node.handle_mst_state(from, batches).await
                    }
                }
            }
        });
        let mut slots = self.write_slots();
        if let Some(previous) = slots.insert(key, Slot { node, inbox, pump }) {
            previous.pump.abort();
        }
    }

    /// Stops every pump task.
    pub fn shutdown(&self) {
        for slot in self.write_slots().values() {
            slot.pump.abort();
        }
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PublicKey, Slot>> {
        match self.slots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn node_of(&self, key: &PublicKey) -> Result<Arc<Node>, NetworkError> {
        let slots = match self.slots.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots
            .get(key)
            .map(|slot| slot.node.clone())
            .ok_or_else(|| NetworkError(format!("unknown peer {key}")))
    }

    fn inbox_of(&self, key: &PublicKey) -> Result<mpsc::Sender<Delivery>, NetworkError> {
        let slots = match self.slots.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots
            .get(key)
            .map(|slot| slot.inbox.clone())
            .ok_or_else(|| NetworkError(format!("unknown peer {key}")))
    }
}

/// One node's view of the in-process network.
pub struct Endpoint {
    router: Arc<InProcessNetwork>,
    own: Peer,
}

#[async_trait]
impl YacNetwork for Endpoint {
    async fn send_state(&self, to: &Peer, state: Vec<VoteMessage>) -> Result<(), NetworkError> {
        let inbox = self.router.inbox_of(&to.public_key)?;
        inbox
            .send(Delivery::YacState(state))
            .await
            .map_err(|_| NetworkError("receiver stopped".into()))
    }
}

#[async_trait]
impl MstNetwork for Endpoint {
    async fn send_state(
        &self,
        to: &Peer,
        state: Vec<TransactionBatch>,
    ) -> Result<(), NetworkError> {
        let inbox = self.router.inbox_of(&to.public_key)?;
        inbox
            .send(Delivery::MstState(self.own.clone(), state))
            .await
            .map_err(|_| NetworkError("receiver stopped".into()))
    }
}

#[async_trait]
impl OrderingNetwork for Endpoint {
    async fn on_batches(
        &self,
        to: &Peer,
        round: Round,
        batches: Vec<TransactionBatch>,
    ) -> Result<(), NetworkError> {
        self.router
            .node_of(&to.public_key)?
            .handle_on_batches(round, batches);
        Ok(())
    }

    async fn on_request_proposal(
        &self,
        to: &Peer,
        round: Round,
    ) -> Result<Option<Proposal>, NetworkError> {
        Ok(self
            .router
            .node_of(&to.public_key)?
            .handle_request_proposal(round))
    }
}

#[async_trait]
impl BlockLoaderNetwork for Endpoint {
    async fn retrieve_block(&self, from: &Peer, hash: Hash) -> Result<Option<Block>, NetworkError> {
        Ok(self
            .router
            .node_of(&from.public_key)?
            .handle_retrieve_block(hash))
    }

    async fn retrieve_blocks(
        &self,
        from: &Peer,
        from_height: u64,
    ) -> Result<mpsc::Receiver<Block>, NetworkError> {
        let blocks = self
            .router
            .node_of(&from.public_key)?
            .handle_retrieve_blocks(from_height);
        let (tx, rx) = mpsc::channel(blocks.len().max(1));
        for block in blocks {
            let _ = tx.send(block).await;
        }
        Ok(rx)
    }
}
