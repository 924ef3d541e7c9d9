// Path: crates/types/src/app/transaction.rs
//! Transactions and transaction batches.

use super::{AccountId, Command, Hash, PublicKey, Signature, SignatureSet, TimeMs};
use crate::codec;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The signed-over part of a transaction. The payload hash is SHA3-256 of
/// the canonical encoding of this struct, so signatures never affect it.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// The account that authored the transaction.
    pub creator_account_id: AccountId,
    /// Client-side creation timestamp, ms since epoch.
    pub created_time: TimeMs,
    /// Number of creator signatories required for the transaction to be
    /// considered fully signed.
    pub quorum: u32,
    /// The ordered commands to execute.
    pub commands: Vec<Command>,
}

/// A command-carrying transaction with its collected signatures.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Transaction {
    /// The signed-over payload.
    pub payload: TransactionPayload,
    /// Signatures over the payload hash, unique by public key.
    pub signatures: SignatureSet,
}

impl Transaction {
    /// Creates an unsigned transaction.
    pub fn new(payload: TransactionPayload) -> Self {
        Self {
            payload,
            signatures: SignatureSet::new(),
        }
    }

    /// The payload hash; signatures are excluded by construction.
    pub fn hash(&self) -> Hash {
        Hash::of(&codec::to_bytes_canonical(&self.payload))
    }

    /// Adds a signature; no-op if the public key is already present.
    pub fn add_signature(&mut self, signature: Signature) -> bool {
        self.signatures.insert(signature)
    }

    /// True once the signature count reaches the declared quorum. Whether
    /// the signatories are actually registered for the creator account is a
    /// stateful question answered by the validator.
    pub fn has_quorum(&self) -> bool {
        self.signatures.len() as u32 >= self.payload.quorum
    }
}

/// Describes the batch a transaction belongs to: the ordered payload
/// hashes of all batch members.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BatchMeta {
    /// Payload hashes of the batch members, in batch order.
    pub transaction_hashes: Vec<Hash>,
}

/// An ordered, atomic group of transactions.
///
/// Two batches are equal iff their member transactions have identical
/// payload hashes in the same order; signatures are deliberately excluded
/// so that differently-signed copies of the same batch meet in the MST
/// state.
#[derive(Clone, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionBatch {
    /// The member transactions, in order.
    pub transactions: Vec<Transaction>,
    /// Optional batch metadata shared by all members.
    pub meta: Option<BatchMeta>,
}

impl TransactionBatch {
    /// Wraps a single transaction into a lone batch.
    pub fn lone(transaction: Transaction) -> Self {
        Self {
            transactions: vec![transaction],
            meta: None,
        }
    }

    /// Builds a batch from ordered transactions, recording their hashes in
    /// the batch meta.
    pub fn new(transactions: Vec<Transaction>) -> Self {
        let meta = BatchMeta {
            transaction_hashes: transactions.iter().map(Transaction::hash).collect(),
        };
        Self {
            transactions,
            meta: Some(meta),
        }
    }

    /// SHA3-256 over the concatenation of member payload hashes; the
    /// identity of the batch for MST bucketing.
    pub fn reduced_hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(self.transactions.len() * 32);
        for tx in &self.transactions {
            bytes.extend_from_slice(&tx.hash().0);
        }
        Hash::of(&bytes)
    }

    /// True once every member transaction has reached its declared quorum.
    pub fn is_complete(&self) -> bool {
        self.transactions.iter().all(Transaction::has_quorum)
    }

    /// The latest member creation time; drives batch expiry.
    pub fn max_created_time(&self) -> TimeMs {
        self.transactions
            .iter()
            .map(|tx| tx.payload.created_time)
            .max()
            .unwrap_or(0)
    }

    /// Adds a signature to the member at `tx_index`; `false` if the index
    /// is out of range or the key is already present on that member.
    pub fn add_signature(&mut self, tx_index: usize, signature: Signature) -> bool {
        match self.transactions.get_mut(tx_index) {
            Some(tx) => tx.add_signature(signature),
            None => false,
        }
    }

    /// Iterates all `(tx_index, signature)` pairs of the batch.
    pub fn signatures(&self) -> impl Iterator<Item = (usize, Signature)> + '_ {
        self.transactions
            .iter()
            .enumerate()
            .flat_map(|(i, tx)| tx.signatures.iter().map(move |s| (i, s)))
    }

    /// The signatories present on the member at `tx_index`.
    pub fn signatories(&self, tx_index: usize) -> Vec<PublicKey> {
        self.transactions
            .get(tx_index)
            .map(|tx| tx.signatures.public_keys().copied().collect())
            .unwrap_or_default()
    }
}

impl PartialEq for TransactionBatch {
    fn eq(&self, other: &Self) -> bool {
        self.transactions.len() == other.transactions.len()
            && self
                .transactions
                .iter()
                .zip(&other.transactions)
                .all(|(a, b)| a.hash() == b.hash())
    }
}

impl Eq for TransactionBatch {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SignatureBytes;

    fn tx(creator: &str, created_time: TimeMs) -> Transaction {
        Transaction::new(TransactionPayload {
            creator_account_id: creator.parse().unwrap(),
            created_time,
            quorum: 1,
            commands: vec![],
        })
    }

    fn sig(byte: u8) -> Signature {
        Signature {
            public_key: PublicKey([byte; 32]),
            signature: SignatureBytes([byte; 64]),
        }
    }

    #[test]
    fn payload_hash_ignores_signatures() {
        let mut a = tx("alice@wonderland", 1);
        let b = a.clone();
        a.add_signature(sig(1));
        a.add_signature(sig(2));
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn batches_compare_by_payload_hashes() {
        let mut signed = tx("alice@wonderland", 1);
        signed.add_signature(sig(1));
        let unsigned = tx("alice@wonderland", 1);

        let left = TransactionBatch::new(vec![signed]);
        let right = TransactionBatch::new(vec![unsigned]);
        assert_eq!(left, right);
        assert_eq!(left.reduced_hash(), right.reduced_hash());

        let other = TransactionBatch::new(vec![tx("bob@wonderland", 1)]);
        assert_ne!(left, other);
    }

    #[test]
    fn completeness_follows_quorum() {
        let mut two_of = tx("alice@wonderland", 1);
        two_of.payload.quorum = 2;
        let mut batch = TransactionBatch::new(vec![two_of]);
        assert!(!batch.is_complete());
        batch.add_signature(0, sig(1));
        assert!(!batch.is_complete());
        batch.add_signature(0, sig(2));
        assert!(batch.is_complete());
    }

    #[test]
    fn max_created_time_spans_members() {
        let batch = TransactionBatch::new(vec![tx("alice@wonderland", 5), tx("bob@wonderland", 9)]);
        assert_eq!(batch.max_created_time(), 9);
    }
}
