// Path: crates/api/src/lib.rs
//! Core traits and interface types for the Meridian ledger node.
//!
//! The concrete components — ordering, consensus, storage, the
//! synchronizer — depend on each other only through the traits defined
//! here. Leaf components are constructed first and streams are injected,
//! never component references, which is what keeps the gate/simulator/
//! synchronizer cycle acyclic at construction time.

/// Consensus gate outcome types.
pub mod consensus;
/// Inter-peer service traits and the network error type.
pub mod network;
/// The on-demand ordering service contract.
pub mod ordering;
/// The client-facing query service contract.
pub mod query;
/// World-state and block-storage contracts.
pub mod state;
/// Synchronizer event types.
pub mod sync;
