// Path: crates/types/src/app/block.rs
//! Blocks, proposals and the verified-proposal form produced by stateful
//! validation.

use super::{Hash, Signature, SignatureSet, TimeMs, Transaction};
use crate::codec;
use crate::error::ValidationError;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Ordered candidate transactions for one consensus round.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Proposal {
    /// The block height this proposal would produce on commit.
    pub height: u64,
    /// Proposal assembly timestamp, ms since epoch.
    pub created_time: TimeMs,
    /// The ordered candidate transactions.
    pub transactions: Vec<Transaction>,
}

impl Proposal {
    /// An empty proposal for a round with no traffic.
    pub fn empty(height: u64, created_time: TimeMs) -> Self {
        Self {
            height,
            created_time,
            transactions: Vec::new(),
        }
    }

    /// The proposal hash: SHA3-256 of the canonical encoding.
    pub fn hash(&self) -> Hash {
        Hash::of(&codec::to_bytes_canonical(self))
    }
}

/// The signed-over part of a block. The payload hash is SHA3-256 of the
/// canonical encoding of this struct, so signatures never affect it.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BlockPayload {
    /// The block height; heights start at 1 with the genesis block.
    pub height: u64,
    /// Payload hash of the block at `height - 1`; all-zero for genesis.
    pub prev_hash: Hash,
    /// Creation timestamp inherited from the proposal.
    pub created_time: TimeMs,
    /// The transactions that passed stateful validation, in order.
    pub transactions: Vec<Transaction>,
    /// Payload hashes of proposal transactions rejected by stateful
    /// validation. Carried in the block so replay protection and status
    /// queries cover rejected transactions on every peer.
    pub rejected_transactions_hashes: Vec<Hash>,
}

/// A chain block: payload plus validator signatures over the payload hash.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Block {
    /// The signed-over payload.
    pub payload: BlockPayload,
    /// Validator signatures, unique by public key.
    pub signatures: SignatureSet,
}

impl Block {
    /// Creates an unsigned block.
    pub fn new(payload: BlockPayload) -> Self {
        Self {
            payload,
            signatures: SignatureSet::new(),
        }
    }

    /// The payload hash; signatures are excluded by construction.
    pub fn hash(&self) -> Hash {
        Hash::of(&codec::to_bytes_canonical(&self.payload))
    }

    /// The block height.
    pub fn height(&self) -> u64 {
        self.payload.height
    }

    /// Adds a validator signature; no-op on duplicate public key.
    pub fn add_signature(&mut self, signature: Signature) -> bool {
        self.signatures.insert(signature)
    }
}

/// Why a proposal transaction was rejected during stateful validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRejection {
    /// Payload hash of the rejected transaction.
    pub tx_hash: Hash,
    /// Index of the transaction within the proposal.
    pub tx_index: u32,
    /// The rejection reason.
    pub error: ValidationError,
}

/// The outcome of stateful validation: the surviving subset of a proposal
/// plus the ordered list of rejections.
#[derive(Clone, Debug)]
pub struct VerifiedProposal {
    /// The proposal restricted to transactions that passed.
    pub proposal: Proposal,
    /// Rejections, ordered by original transaction index.
    pub rejected: Vec<TransactionRejection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{PublicKey, SignatureBytes};

    fn block(height: u64) -> Block {
        Block::new(BlockPayload {
            height,
            prev_hash: Hash::EMPTY,
            created_time: 1,
            transactions: vec![],
            rejected_transactions_hashes: vec![],
        })
    }

    #[test]
    fn block_hash_ignores_signatures() {
        let unsigned = block(2);
        let mut signed = unsigned.clone();
        signed.add_signature(Signature {
            public_key: PublicKey([3u8; 32]),
            signature: SignatureBytes([4u8; 64]),
        });
        assert_eq!(unsigned.hash(), signed.hash());
    }

    #[test]
    fn block_hash_covers_rejected_hashes() {
        let plain = block(2);
        let mut with_rejected = plain.clone();
        with_rejected
            .payload
            .rejected_transactions_hashes
            .push(Hash::of(b"tx"));
        assert_ne!(plain.hash(), with_rejected.hash());
    }
}
