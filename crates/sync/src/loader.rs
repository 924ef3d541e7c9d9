// Path: crates/sync/src/loader.rs
//! Peer block retrieval.

use meridian_api::network::BlockLoaderNetwork;
use meridian_consensus::ConsensusResultCache;
use meridian_types::app::{Block, Hash, Peer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Retrieves blocks by hash or from a height, peer by peer.
pub struct BlockLoader {
    network: Arc<dyn BlockLoaderNetwork>,
    result_cache: Arc<ConsensusResultCache>,
}

impl BlockLoader {
    /// Creates a loader over the given transport and result cache.
    pub fn new(
        network: Arc<dyn BlockLoaderNetwork>,
        result_cache: Arc<ConsensusResultCache>,
    ) -> Self {
        Self {
            network,
            result_cache,
        }
    }

    /// One block by payload hash: the consensus result cache first,
    /// then the peer. A block whose payload hash does not match the
    /// request is discarded.
    pub async fn retrieve_block(&self, peer: &Peer, hash: Hash) -> Option<Block> {
        if let Some(block) = self.result_cache.get(&hash) {
            debug!(block = %hash, "served from consensus result cache");
            return Some(block);
        }

        match self.network.retrieve_block(peer, hash).await {
            Ok(Some(block)) if block.hash() == hash => Some(block),
            Ok(Some(block)) => {
                warn!(
                    peer = %peer.public_key,
                    requested = %hash,
                    got = %block.hash(),
                    "peer returned a block with a different hash"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(peer = %peer.public_key, error = %e, "block retrieval failed");
                None
            }
        }
    }

    /// The peer's chain from `from_height` upward, collected until the
    /// stream ends or an element fails to arrive.
    pub async fn retrieve_blocks(&self, peer: &Peer, from_height: u64) -> Vec<Block> {
        let mut receiver: mpsc::Receiver<Block> =
            match self.network.retrieve_blocks(peer, from_height).await {
                Ok(receiver) => receiver,
                Err(e) => {
                    warn!(peer = %peer.public_key, error = %e, "chain retrieval failed");
                    return Vec::new();
                }
            };

        let mut blocks = Vec::new();
        while let Some(block) = receiver.recv().await {
            blocks.push(block);
        }
        blocks
    }
}
