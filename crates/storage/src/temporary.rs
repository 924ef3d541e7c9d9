// Path: crates/storage/src/temporary.rs
//! Temporary world-state views for stateful validation.
//!
//! A temporary view is an overlay stack over the committed database.
//! Nothing it stages ever reaches disk: dropping the view is the rollback.

use crate::access::{KvRead, KvWrite};
use crate::overlay::OverlayStack;
use crate::store;
use crate::{executor, impl_wsv_query};
use meridian_api::state::TemporaryWsv;
use meridian_types::app::{AccountId, Command};
use meridian_types::error::{CommandError, StorageError};
use redb::Database;
use std::sync::Arc;

/// A world-state view valid for one proposal's stateful validation.
pub struct TemporaryWsvImpl {
    db: Arc<Database>,
    overlay: OverlayStack,
}

impl TemporaryWsvImpl {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            overlay: OverlayStack::new(),
        }
    }
}

impl KvRead for TemporaryWsvImpl {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        match self.overlay.get(key) {
            Some(staged) => Ok(staged),
            None => store::read_committed(&self.db, key),
        }
    }
}

impl KvWrite for TemporaryWsvImpl {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.put(key, value);
    }

    fn delete_raw(&mut self, key: Vec<u8>) {
        self.overlay.delete(key);
    }
}

impl_wsv_query!(TemporaryWsvImpl);

impl TemporaryWsv for TemporaryWsvImpl {
    fn savepoint(&mut self, name: &str) -> Result<(), StorageError> {
        self.overlay.push_savepoint(name);
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> Result<(), StorageError> {
        self.overlay.release_savepoint(name)
    }

    fn rollback_savepoint(&mut self, name: &str) -> Result<(), StorageError> {
        self.overlay.rollback_savepoint(name)
    }

    fn execute(&mut self, creator: &AccountId, command: &Command) -> Result<(), CommandError> {
        executor::execute_command(self, creator, command)
    }
}
