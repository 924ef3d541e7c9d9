// Path: crates/types/src/lib.rs
//! Core data structures and error types for the Meridian ledger node.
//!
//! Everything consensus-critical lives here: the wire model (transactions,
//! batches, proposals, blocks, votes), the canonical codec, the command
//! grammar with its permission sets, and the error taxonomy shared by the
//! rest of the workspace. The crate is deliberately leaf-level so that every
//! component agrees on one binary representation of the ledger objects.

/// Application-level ledger objects: hashes, keys, commands, transactions,
/// batches, proposals, blocks and consensus messages.
pub mod app;
/// Canonical, deterministic binary codec (SCALE) plus length-prefixed framing.
pub mod codec;
/// Node configuration structures and the JSON loader.
pub mod config;
/// Error types and the stable machine-readable `ErrorCode` taxonomy.
pub mod error;
/// Key namespaces for the world-state backend and its secondary indexes.
pub mod keys;
