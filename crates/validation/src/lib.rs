// Path: crates/validation/src/lib.rs
//! Stateful proposal validation, chain validation and block simulation.
//!
//! The stateful validator runs a proposal against a temporary world-state
//! view; the simulator wraps that into candidate-block production; the
//! chain validator replays downloaded chains during synchronization.

/// Chain validation for downloaded block chains.
pub mod chain;
/// Per-command permission predicates.
pub mod permissions;
/// Candidate-block production from verified proposals.
pub mod simulator;
/// Stateful validation of proposals.
pub mod stateful;

pub use chain::ChainValidator;
pub use simulator::Simulator;
pub use stateful::StatefulValidator;
