// Path: crates/sync/src/lib.rs
//! Block loading and chain synchronization.
//!
//! The loader fetches blocks from peers (consulting the consensus result
//! cache first); the synchronizer turns consensus outcomes into durable
//! commits, downloading and validating the agreed chain when this node
//! voted for a different block.

/// Peer block retrieval.
pub mod loader;
/// Consensus-outcome application and recovery.
pub mod synchronizer;

pub use loader::BlockLoader;
pub use synchronizer::Synchronizer;
