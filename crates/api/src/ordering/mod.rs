// Path: crates/api/src/ordering/mod.rs
//! The on-demand ordering service contract.

use crate::sync::SynchronizationOutcome;
use meridian_types::app::{Proposal, Round, TransactionBatch};

/// A proposal bound to the round it was requested for; the input of the
/// simulator pipeline.
#[derive(Clone, Debug)]
pub struct RoundProposal {
    /// The round the proposal belongs to.
    pub round: Round,
    /// The proposal; synthesized empty when the ordering service had
    /// nothing for the round.
    pub proposal: Proposal,
}

/// The on-demand ordering service: collects batches per round and, when
/// asked, hands out the proposal assembled for a round. It never pushes
/// proposals anywhere.
pub trait OnDemandOrderingService: Send + Sync {
    /// Admits client batches for the given round; batches already present
    /// in the ledger are dropped by the replay filter.
    fn on_batches(&self, round: Round, batches: Vec<TransactionBatch>);

    /// Informs the service that `completed_round` finished with the given
    /// outcome, letting it pack the proposal for the successor round and
    /// evict stale state.
    fn on_collaboration_outcome(
        &self,
        completed_round: Round,
        outcome: SynchronizationOutcome,
    );

    /// The proposal stored for `round`, if one was packed.
    fn on_request_proposal(&self, round: Round) -> Option<Proposal>;
}
