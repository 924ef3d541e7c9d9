// Path: crates/storage/src/overlay.rs
//! Copy-on-write overlay layers implementing nested savepoints.
//!
//! A view's writes are captured in a stack of `BTreeMap` layers
//! (deterministic commit order). The bottom layer is the transaction
//! scope; every savepoint pushes a named layer. Releasing a savepoint
//! folds its writes into the parent layer; rolling it back discards them.
//! `None` values mark deletions.

use meridian_types::error::StorageError;
use std::collections::BTreeMap;

type Writes = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

struct Layer {
    name: Option<String>,
    writes: Writes,
}

/// A stack of copy-on-write layers over some base state.
pub struct OverlayStack {
    layers: Vec<Layer>,
}

impl OverlayStack {
    /// Creates the transaction-scope overlay with one anonymous base
    /// layer.
    pub fn new() -> Self {
        Self {
            layers: vec![Layer {
                name: None,
                writes: Writes::new(),
            }],
        }
    }

    /// The staged value for `key`, searching layers top-down.
    /// `None` means the overlay holds nothing for this key; `Some(None)`
    /// means the key is staged as deleted.
    pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.writes.get(key).cloned())
    }

    /// Stages `value` under `key` in the top layer.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.top().writes.insert(key, Some(value));
    }

    /// Stages the deletion of `key` in the top layer.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.top().writes.insert(key, None);
    }

    /// Pushes a named savepoint layer.
    pub fn push_savepoint(&mut self, name: &str) {
        self.layers.push(Layer {
            name: Some(name.to_string()),
            writes: Writes::new(),
        });
    }

    /// Folds the innermost savepoint, which must carry `name`, into its
    /// parent layer.
    pub fn release_savepoint(&mut self, name: &str) -> Result<(), StorageError> {
        self.check_innermost(name)?;
        if let Some(released) = self.layers.pop() {
            if let Some(parent) = self.layers.last_mut() {
                parent.writes.extend(released.writes);
            }
        }
        Ok(())
    }

    /// Discards the innermost savepoint, which must carry `name`.
    pub fn rollback_savepoint(&mut self, name: &str) -> Result<(), StorageError> {
        self.check_innermost(name)?;
        self.layers.pop();
        Ok(())
    }

    /// Flattens the stack into one deterministic write batch. Any still
    /// open savepoints are folded in; callers release or roll back before
    /// committing.
    pub fn into_writes(self) -> Writes {
        let mut all = Writes::new();
        for layer in self.layers {
            all.extend(layer.writes);
        }
        all
    }

    fn top(&mut self) -> &mut Layer {
        if self.layers.is_empty() {
            self.layers.push(Layer {
                name: None,
                writes: Writes::new(),
            });
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    fn check_innermost(&self, name: &str) -> Result<(), StorageError> {
        match self.layers.last().and_then(|l| l.name.as_deref()) {
            Some(innermost) if innermost == name => Ok(()),
            Some(innermost) => Err(StorageError::Backend(format!(
                "savepoint {name} is not innermost (innermost is {innermost})"
            ))),
            None => Err(StorageError::Backend(format!(
                "no savepoint named {name} is open"
            ))),
        }
    }
}

impl Default for OverlayStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_folds_into_parent() {
        let mut stack = OverlayStack::new();
        stack.put(b"a".to_vec(), b"1".to_vec());
        stack.push_savepoint("sp");
        stack.put(b"b".to_vec(), b"2".to_vec());
        stack.release_savepoint("sp").unwrap();

        assert_eq!(stack.get(b"a"), Some(Some(b"1".to_vec())));
        assert_eq!(stack.get(b"b"), Some(Some(b"2".to_vec())));
    }

    #[test]
    fn rollback_discards_layer() {
        let mut stack = OverlayStack::new();
        stack.put(b"a".to_vec(), b"1".to_vec());
        stack.push_savepoint("sp");
        stack.put(b"a".to_vec(), b"overwritten".to_vec());
        stack.put(b"b".to_vec(), b"2".to_vec());
        stack.rollback_savepoint("sp").unwrap();

        assert_eq!(stack.get(b"a"), Some(Some(b"1".to_vec())));
        assert_eq!(stack.get(b"b"), None);
    }

    #[test]
    fn savepoints_enforce_stack_discipline() {
        let mut stack = OverlayStack::new();
        stack.push_savepoint("outer");
        stack.push_savepoint("inner");
        // Releasing the outer one first violates the nesting order.
        assert!(stack.release_savepoint("outer").is_err());
        stack.release_savepoint("inner").unwrap();
        stack.release_savepoint("outer").unwrap();
        assert!(stack.rollback_savepoint("outer").is_err());
    }

    #[test]
    fn deletes_shadow_earlier_writes() {
        let mut stack = OverlayStack::new();
        stack.put(b"k".to_vec(), b"v".to_vec());
        stack.push_savepoint("sp");
        stack.delete(b"k".to_vec());
        assert_eq!(stack.get(b"k"), Some(None));
        stack.release_savepoint("sp").unwrap();
        assert_eq!(stack.get(b"k"), Some(None));

        let writes = stack.into_writes();
        assert_eq!(writes.get(b"k".as_slice()), Some(&None));
    }
}
