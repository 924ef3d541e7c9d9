// Path: crates/storage/src/mutable.rs
//! Mutable storage transactions.
//!
//! A mutable storage stages one or more blocks: command execution into a
//! world-state overlay, secondary-index entries, and the block files.
//! Nothing is durable until [`commit`](meridian_api::state::MutableStorage::commit);
//! dropping the storage is the rollback.

use crate::access::{KvRead, KvWrite};
use crate::block_store::FlatFileBlockStore;
use crate::overlay::OverlayStack;
use crate::{executor, impl_wsv_query, queries, store};
use meridian_api::state::{BlockStore, MutableStorage};
use meridian_types::app::{Block, Command, Hash};
use meridian_types::error::StorageError;
use meridian_types::{codec, keys};
use redb::Database;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct MutableStorageImpl {
    db: Arc<Database>,
    block_store: FlatFileBlockStore,
    staged: OverlayStack,
    blocks: Vec<Block>,
    top_height: u64,
    top_hash: Hash,
}

impl MutableStorageImpl {
    pub(crate) fn new(
        db: Arc<Database>,
        block_store: FlatFileBlockStore,
        top_height: u64,
        top_hash: Hash,
    ) -> Self {
        Self {
            db,
            block_store,
            staged: OverlayStack::new(),
            blocks: Vec::new(),
            top_height,
            top_hash,
        }
    }

    fn stage<T: parity_scale_codec::Encode>(&mut self, key: Vec<u8>, value: &T) {
        self.staged.put(key, codec::to_bytes_canonical(value));
    }

    /// Writes the secondary-index entries for an applied block.
    fn index_block(&mut self, block: &Block) -> Result<(), StorageError> {
        let height = block.height();
        self.stage(keys::block_hash_key(&block.hash()), &height);

        for (tx_index, tx) in block.payload.transactions.iter().enumerate() {
            let creator = tx.payload.creator_account_id.clone();
            self.stage(keys::tx_committed_key(&tx.hash()), &height);

            let mut heights: Vec<u64> = queries::get_decoded(self, &keys::creator_heights_key(&creator))?
                .unwrap_or_default();
            if heights.last() != Some(&height) {
                heights.push(height);
                self.stage(keys::creator_heights_key(&creator), &heights);
            }

            for command in &tx.payload.commands {
                if let Command::TransferAsset {
                    src_account_id,
                    dest_account_id,
                    asset_id,
                    ..
                } = command
                {
                    for account in [src_account_id, dest_account_id] {
                        let key = keys::account_asset_txs_key(account, height, asset_id);
                        let mut indexes: Vec<u32> =
                            queries::get_decoded(self, &key)?.unwrap_or_default();
                        indexes.push(tx_index as u32);
                        self.stage(key, &indexes);
                    }
                }
            }
        }

        for rejected in &block.payload.rejected_transactions_hashes {
            self.stage(keys::tx_rejected_key(rejected), &height);
        }
        Ok(())
    }
}

impl KvRead for MutableStorageImpl {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        match self.staged.get(key) {
            Some(staged) => Ok(staged),
            None => store::read_committed(&self.db, key),
        }
    }
}

impl KvWrite for MutableStorageImpl {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.put(key, value);
    }

    fn delete_raw(&mut self, key: Vec<u8>) {
        self.staged.delete(key);
    }
}

impl_wsv_query!(MutableStorageImpl);

impl MutableStorage for MutableStorageImpl {
    fn apply(&mut self, block: &Block) -> Result<(), StorageError> {
        if block.height() != self.top_height + 1 {
            return Err(StorageError::ApplyFailed(format!(
                "block height {} does not follow top height {}",
                block.height(),
                self.top_height
            )));
        }
        if block.payload.prev_hash != self.top_hash {
            return Err(StorageError::ApplyFailed(format!(
                "block prev_hash {} does not match top hash {}",
                block.payload.prev_hash, self.top_hash
            )));
        }

        for (tx_index, tx) in block.payload.transactions.iter().enumerate() {
            for command in &tx.payload.commands {
                executor::execute_command(self, &tx.payload.creator_account_id, command).map_err(
                    |e| {
                        StorageError::ApplyFailed(format!(
                            "transaction {tx_index} of block {}: {e}",
                            block.height()
                        ))
                    },
                )?;
            }
        }

        self.index_block(block)?;
        self.top_height = block.height();
        self.top_hash = block.hash();
        let height = self.top_height;
        let hash = self.top_hash;
        self.stage(keys::TOP_HEIGHT_KEY.to_vec(), &height);
        self.stage(keys::TOP_HASH_KEY.to_vec(), &hash);
        self.blocks.push(block.clone());
        Ok(())
    }

    fn top_height(&self) -> u64 {
        self.top_height
    }

    fn top_hash(&self) -> Hash {
        self.top_hash
    }

    fn commit(self: Box<Self>) -> Result<Vec<Block>, StorageError> {
        let this = *self;

        // Block files first: the database commit below is the
        // linearization point, a stale orphan file is overwritten by the
        // next commit at the same height.
        for block in &this.blocks {
            this.block_store.insert(block.height(), block)?;
        }

        let txn = this
            .db
            .begin_write()
            .map_err(|e| StorageError::TransactionBegin(e.to_string()))?;
        {
            let mut table = txn
                .open_table(store::WSV_TABLE)
                .map_err(|e| StorageError::CommitFailed(e.to_string()))?;
            for (key, value) in this.staged.into_writes() {
                match value {
                    Some(value) => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;
                    }
                    None => {
                        table
                            .remove(key.as_slice())
                            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;
                    }
                }
            }
        }
        txn.commit()
            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;

        debug!(
            blocks = this.blocks.len(),
            top_height = this.top_height,
            "committed mutable storage"
        );
        Ok(this.blocks)
    }
}
