// Path: crates/api/src/network/mod.rs
//! Inter-peer service traits.
//!
//! The transport skin (framing, TLS, connection management) lives outside
//! the core; these traits are what the core components program against.
//! Implementations route to remote peers over the wire, or in-process for
//! tests and single-peer deployments.

use async_trait::async_trait;
use meridian_types::app::{
    Block, Hash, Peer, Proposal, Round, TransactionBatch, VoteMessage,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// A transport-level failure. Senders log and drop; no layer retries a
/// send, timers and signatory rotation provide the retry semantics.
#[derive(Debug, Error)]
#[error("Network error: {0}")]
pub struct NetworkError(pub String);

/// Client side of the on-demand ordering service of a peer.
#[async_trait]
pub trait OrderingNetwork: Send + Sync {
    /// Delivers client batches for the given round to the peer's ordering
    /// service.
    async fn on_batches(
        &self,
        to: &Peer,
        round: Round,
        batches: Vec<TransactionBatch>,
    ) -> Result<(), NetworkError>;

    /// Requests the proposal the peer's ordering service holds for the
    /// given round.
    async fn on_request_proposal(
        &self,
        to: &Peer,
        round: Round,
    ) -> Result<Option<Proposal>, NetworkError>;
}

/// Client side of the consensus vote transport.
#[async_trait]
pub trait YacNetwork: Send + Sync {
    /// Sends a vote state (a single vote, or a commit/reject certificate)
    /// to a peer.
    async fn send_state(&self, to: &Peer, state: Vec<VoteMessage>) -> Result<(), NetworkError>;
}

/// Client side of the multi-signature gossip transport. The wire form of
/// an MST state is the list of its batches with their collected
/// signatures.
#[async_trait]
pub trait MstNetwork: Send + Sync {
    /// Sends the local MST state to a peer.
    async fn send_state(
        &self,
        to: &Peer,
        state: Vec<TransactionBatch>,
    ) -> Result<(), NetworkError>;
}

/// Client side of the block loader service of a peer.
#[async_trait]
pub trait BlockLoaderNetwork: Send + Sync {
    /// Requests one block by payload hash.
    async fn retrieve_block(
        &self,
        from: &Peer,
        hash: Hash,
    ) -> Result<Option<Block>, NetworkError>;

    /// Streams the peer's blocks from `from_height` upward. The stream
    /// ends when the peer has no more blocks or on error.
    async fn retrieve_blocks(
        &self,
        from: &Peer,
        from_height: u64,
    ) -> Result<mpsc::Receiver<Block>, NetworkError>;
}
