// Path: crates/ordering/src/lib.rs
//! On-demand ordering for the Meridian ledger node.
//!
//! The ordering service collects batches per round and packs bounded
//! proposals when rounds complete; the gate tracks the current round,
//! requests proposals on every synchronization event, and routes client
//! batches to the round's elected ordering peer.

/// The ordering gate: round clock, proposal requests, batch propagation.
pub mod gate;
/// The on-demand ordering service: per-round queues and the proposal ring.
pub mod service;

pub use gate::OrderingGate;
pub use service::OnDemandOrderingServiceImpl;
