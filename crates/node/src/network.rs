// Path: crates/node/src/network.rs
//! Loopback transports for single-peer deployments.
//!
//! A single-validator cluster still walks the vote ring — over itself —
//! so the vote transport must deliver to the local node. The loopback
//! stack routes vote and ordering messages back through channels the
//! caller attaches to the node; gossip has nobody to reach and block
//! loading is never needed without a second peer.

use crate::node::Node;
use async_trait::async_trait;
use meridian_api::network::{
    BlockLoaderNetwork, MstNetwork, NetworkError, OrderingNetwork, YacNetwork,
};
use meridian_types::app::{
    Block, Hash, Peer, Proposal, Round, TransactionBatch, VoteMessage,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::node::NetworkStack;

enum LoopbackMessage {
    YacState(Vec<VoteMessage>),
    Batches(Round, Vec<TransactionBatch>),
}

struct LoopbackSender {
    tx: mpsc::Sender<LoopbackMessage>,
}

#[async_trait]
impl YacNetwork for LoopbackSender {
    async fn send_state(&self, _to: &Peer, state: Vec<VoteMessage>) -> Result<(), NetworkError> {
        self.tx
            .send(LoopbackMessage::YacState(state))
            .await
            .map_err(|_| NetworkError("loopback closed".into()))
    }
}

#[async_trait]
impl OrderingNetwork for LoopbackSender {
    async fn on_batches(
        &self,
        _to: &Peer,
        round: Round,
        batches: Vec<TransactionBatch>,
    ) -> Result<(), NetworkError> {
        self.tx
            .send(LoopbackMessage::Batches(round, batches))
            .await
            .map_err(|_| NetworkError("loopback closed".into()))
    }

    async fn on_request_proposal(
        &self,
        _to: &Peer,
        _round: Round,
    ) -> Result<Option<Proposal>, NetworkError> {
        // The gate always takes the in-process shortcut to its own
        // service in a single-peer cluster.
        Ok(None)
    }
}

struct NoGossip;

#[async_trait]
impl MstNetwork for NoGossip {
    async fn send_state(
        &self,
        to: &Peer,
        _state: Vec<TransactionBatch>,
    ) -> Result<(), NetworkError> {
        debug!(peer = %to.public_key, "no gossip transport in a single-peer cluster");
        Ok(())
    }
}

struct NoLoader;

#[async_trait]
impl BlockLoaderNetwork for NoLoader {
    async fn retrieve_block(&self, _from: &Peer, _hash: Hash) -> Result<Option<Block>, NetworkError> {
        Err(NetworkError("no block loader transport".into()))
    }

    async fn retrieve_blocks(
        &self,
        _from: &Peer,
        _from_height: u64,
    ) -> Result<mpsc::Receiver<Block>, NetworkError> {
        Err(NetworkError("no block loader transport".into()))
    }
}

/// The receiving half of the loopback stack; attach it to the node once
/// constructed.
pub struct LoopbackRx {
    rx: mpsc::Receiver<LoopbackMessage>,
}

/// Builds the loopback network stack for a single-peer deployment.
pub fn loopback_stack() -> (NetworkStack, LoopbackRx) {
    let (tx, rx) = mpsc::channel(64);
    let sender = Arc::new(LoopbackSender { tx });
    (
        NetworkStack {
            ordering: sender.clone(),
            yac: sender,
            mst: Arc::new(NoGossip),
            loader: Arc::new(NoLoader),
        },
        LoopbackRx { rx },
    )
}

/// Routes loopback messages into the node's inbound handlers.
pub fn attach_loopback(node: Arc<Node>, mut loopback: LoopbackRx) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = loopback.rx.recv().await {
            match message {
                LoopbackMessage::YacState(state) => node.handle_yac_state(state).await,
                LoopbackMessage::Batches(round, batches) => {
                    node.handle_on_batches(round, batches)
                }
            }
        }
    })
}
