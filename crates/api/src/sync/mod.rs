// Path: crates/api/src/sync/mod.rs
//! Synchronizer event types.

use meridian_types::app::{Block, Round};

/// How a round ended from the ledger's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynchronizationOutcome {
    /// One or more blocks were committed.
    Commit,
    /// The round was rejected; the reject ordinal advances.
    Reject,
    /// The cluster agreed on nothing; the reject ordinal advances.
    Nothing,
}

/// Emitted by the synchronizer after every consensus outcome; the
/// ordering gate and the status pipeline consume these.
#[derive(Clone, Debug)]
pub struct SynchronizationEvent {
    /// The blocks committed by this round, in apply order; empty on
    /// reject and nothing outcomes.
    pub blocks: Vec<Block>,
    /// How the round ended.
    pub outcome: SynchronizationOutcome,
    /// The round that ended.
    pub round: Round,
}
