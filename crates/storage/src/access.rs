// Path: crates/storage/src/access.rs
//! Raw key-value access traits.
//!
//! Every world-state view — temporary overlay, mutable transaction, the
//! committed database itself — exposes the same narrow surface so that
//! the command executor and the queries are written once.

use meridian_types::error::StorageError;

/// Read access to namespaced world-state keys.
pub trait KvRead {
    /// The raw value under `key`, if present.
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Write access on top of [`KvRead`]. Writes are staged in the view and
/// only become durable through a commit.
pub trait KvWrite: KvRead {
    /// Stages `value` under `key`.
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Stages the removal of `key`.
    fn delete_raw(&mut self, key: Vec<u8>);
}
