// Path: crates/mst/src/lib.rs
//! Multi-signature transaction (MST) aggregation.
//!
//! Batches whose signatory quorum is not yet satisfied live in the MST
//! state, which peers gossip until every constituent transaction is fully
//! signed; completed batches flow onward into ordering. The state is
//! owned by a single processor task; everything reaches it through a
//! channel.

/// Round-robin gossip peer selection over a shuffled queue.
pub mod gossip;
/// The processor task and its command/stream plumbing.
pub mod processor;
/// The MST state: signature accumulation, completion, expiry.
pub mod state;

pub use gossip::GossipPropagationStrategy;
pub use processor::{spawn_mst_processor, MstProcessorHandle, MstStreams};
pub use state::{Completer, DefaultCompleter, MstState};
