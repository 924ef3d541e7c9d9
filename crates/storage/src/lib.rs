// Path: crates/storage/src/lib.rs
//! World-state backend, block store and secondary indexes for the
//! Meridian ledger node.
//!
//! One embedded `redb` database holds the world state and the secondary
//! indexes under namespaced keys; committed blocks live as flat files, one
//! per height. [`Storage`] is the single entry point: it hands out
//! temporary world-state views for proposal validation and mutable
//! storage transactions for block application.

/// Raw key-value access traits shared by the overlays and the executor.
pub mod access;
/// Flat-file block store, one length-prefixed file per height.
pub mod block_store;
/// Command execution against a world-state view.
pub mod executor;
/// Mutable storage transactions: block application, indexing, commit.
pub mod mutable;
/// Copy-on-write overlay layers implementing nested savepoints.
pub mod overlay;
/// Decoding world-state queries shared by all views.
pub mod queries;
/// Client-query execution over committed state and the indexes.
pub mod query_executor;
/// The storage facade: database handle, factories, block queries.
pub mod store;
/// Temporary world-state views for stateful validation.
pub mod temporary;

pub use block_store::FlatFileBlockStore;
pub use store::Storage;
