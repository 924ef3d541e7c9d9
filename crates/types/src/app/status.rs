// Path: crates/types/src/app/status.rs
//! User-visible statuses of a submitted transaction.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The lifecycle status of a submitted transaction, as surfaced to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum TxStatus {
    /// The multi-signature layer collected enough signatures; the batch
    /// moved on to ordering.
    EnoughSignaturesCollected,
    /// Stateful validation rejected the transaction with the given
    /// command error code.
    StatefulValidationFailed(u32),
    /// The transaction is part of a committed block.
    Committed,
    /// The transaction was rejected.
    Rejected,
    /// The transaction expired in the multi-signature layer before
    /// collecting its quorum.
    MstExpired,
}
