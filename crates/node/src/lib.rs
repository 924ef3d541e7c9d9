// Path: crates/node/src/lib.rs
//! The Meridian ledger node: construction and wiring of the consensus
//! and block-application pipeline.
//!
//! Leaf components are constructed first and connected by channels; no
//! component holds a reference to a downstream component, which is what
//! keeps the gate/simulator/synchronizer cycle acyclic at construction
//! time.

/// Genesis block loading, validation and installation.
pub mod genesis;
/// Loopback transports for single-peer deployments.
pub mod network;
/// Node construction, task wiring and inbound handlers.
pub mod node;
/// Transaction status store and broadcast bus.
pub mod status;
/// Tracing initialization.
pub mod telemetry;

pub use node::{Node, NetworkStack};
pub use status::StatusBus;
