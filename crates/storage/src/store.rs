// Path: crates/storage/src/store.rs
//! The storage facade.
//!
//! [`Storage`] owns the embedded database and the block file store and
//! implements the factory and query contracts the rest of the node
//! depends on. One writer at a time (the synchronizer); readers run
//! concurrently against committed state.

use crate::access::KvRead;
use crate::block_store::FlatFileBlockStore;
use crate::mutable::MutableStorageImpl;
use crate::temporary::TemporaryWsvImpl;
use crate::{impl_wsv_query, queries};
use meridian_api::state::{
    BlockQuery, BlockStore, MutableFactory, MutableStorage, PeerQuery, TemporaryFactory,
    TemporaryWsv, TxPresence, TxPresenceCache,
};
use meridian_types::app::Peer;
use meridian_types::app::{Block, Hash};
use meridian_types::error::StorageError;
use meridian_types::keys;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub(crate) const WSV_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("wsv");

pub(crate) fn read_committed(db: &Database, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
    let txn = db
        .begin_read()
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let table = txn
        .open_table(WSV_TABLE)
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let value = table
        .get(key)
        .map_err(|e| StorageError::Backend(e.to_string()))?
        .map(|guard| guard.value().to_vec());
    Ok(value)
}

/// The world-state backend plus the block file store.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
    block_store: FlatFileBlockStore,
}

impl Storage {
    /// Opens (creating if needed) the database file and the block store
    /// directory.
    pub fn open(db_path: &Path, block_store_dir: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Backend(format!("create {}: {e}", parent.display())))?;
            }
        }
        let db = Database::create(db_path)
            .map_err(|e| StorageError::Backend(format!("open {}: {e}", db_path.display())))?;
        // Ensure the table exists so later read transactions never fail.
        let txn = db
            .begin_write()
            .map_err(|e| StorageError::TransactionBegin(e.to_string()))?;
        txn.open_table(WSV_TABLE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        txn.commit()
            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;

        let block_store = FlatFileBlockStore::open(block_store_dir)?;
        Ok(Self {
            db: Arc::new(db),
            block_store,
        })
    }

    /// Drops every world-state entry and every block file. Used by
    /// `--overwrite_ledger`.
    pub fn drop_ledger(&self) -> Result<(), StorageError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::TransactionBegin(e.to_string()))?;
        txn.delete_table(WSV_TABLE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        txn.open_table(WSV_TABLE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        txn.commit()
            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;
        self.block_store.clear()?;
        info!("ledger dropped");
        Ok(())
    }

    /// The block file store.
    pub fn block_store(&self) -> &FlatFileBlockStore {
        &self.block_store
    }
}

impl KvRead for Storage {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        read_committed(&self.db, key)
    }
}

impl_wsv_query!(Storage);

impl TemporaryFactory for Storage {
    fn create_temporary_wsv(&self) -> Result<Box<dyn TemporaryWsv>, StorageError> {
        Ok(Box::new(TemporaryWsvImpl::new(self.db.clone())))
    }
}

impl MutableFactory for Storage {
    fn create_mutable_storage(&self) -> Result<Box<dyn MutableStorage>, StorageError> {
        let top_height: u64 =
            queries::get_decoded(self, keys::TOP_HEIGHT_KEY)?.unwrap_or_default();
        let top_hash: Hash = queries::get_decoded(self, keys::TOP_HASH_KEY)?.unwrap_or(Hash::EMPTY);
        Ok(Box::new(MutableStorageImpl::new(
            self.db.clone(),
            self.block_store.clone(),
            top_height,
            top_hash,
        )))
    }
}

impl BlockQuery for Storage {
    fn top_block(&self) -> Result<Option<Block>, StorageError> {
        match self.top_height()? {
            0 => Ok(None),
            height => self.block_store.fetch(height),
        }
    }

    fn top_height(&self) -> Result<u64, StorageError> {
        Ok(queries::get_decoded(self, keys::TOP_HEIGHT_KEY)?.unwrap_or_default())
    }

    fn block(&self, height: u64) -> Result<Option<Block>, StorageError> {
        self.block_store.fetch(height)
    }

    fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        match queries::get_decoded::<u64>(self, &keys::block_hash_key(hash))? {
            Some(height) => self.block_store.fetch(height),
            None => Ok(None),
        }
    }
}

impl PeerQuery for Storage {
    fn ledger_peers(&self) -> Result<Vec<Peer>, StorageError> {
        queries::peers(self)
    }
}

impl TxPresenceCache for Storage {
    fn check(&self, hash: &Hash) -> Result<TxPresence, StorageError> {
        if let Some(height) = queries::get_decoded::<u64>(self, &keys::tx_committed_key(hash))? {
            return Ok(TxPresence::Committed(height));
        }
        if let Some(height) = queries::get_decoded::<u64>(self, &keys::tx_rejected_key(hash))? {
            return Ok(TxPresence::Rejected(height));
        }
        Ok(TxPresence::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_api::state::WsvQuery;
    use meridian_types::app::{
        Amount, Block, BlockPayload, Command, Peer, PublicKey, RolePermissions, Transaction,
        TransactionPayload,
    };

    fn genesis_block() -> Block {
        let commands = vec![
            Command::CreateRole {
                role_name: "admin".parse().unwrap(),
                permissions: RolePermissions::all(),
            },
            Command::CreateDomain {
                domain_id: "wonderland".parse().unwrap(),
                default_role: "admin".parse().unwrap(),
            },
            Command::CreateAccount {
                account_name: "alice".to_string(),
                domain_id: "wonderland".parse().unwrap(),
                public_key: PublicKey([1u8; 32]),
            },
            Command::AddPeer {
                peer: Peer {
                    address: "127.0.0.1:10001".to_string(),
                    public_key: PublicKey([9u8; 32]),
                },
            },
        ];
        Block::new(BlockPayload {
            height: 1,
            prev_hash: Hash::EMPTY,
            created_time: 0,
            transactions: vec![Transaction::new(TransactionPayload {
                creator_account_id: "genesis@wonderland".parse().unwrap(),
                created_time: 0,
                quorum: 1,
                commands,
            })],
            rejected_transactions_hashes: vec![],
        })
    }

    fn open_storage(dir: &Path) -> Storage {
        Storage::open(&dir.join("wsv.redb"), &dir.join("blocks")).unwrap()
    }

    fn commit_genesis(storage: &Storage) -> Block {
        let genesis = genesis_block();
        let mut mutable = storage.create_mutable_storage().unwrap();
        mutable.apply(&genesis).unwrap();
        mutable.commit().unwrap();
        genesis
    }

    #[test]
    fn genesis_commit_populates_state_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        let genesis = commit_genesis(&storage);

        assert_eq!(storage.top_height().unwrap(), 1);
        assert_eq!(storage.top_block().unwrap().unwrap().hash(), genesis.hash());
        assert_eq!(
            storage.block_by_hash(&genesis.hash()).unwrap().unwrap().height(),
            1
        );

        let alice = "alice@wonderland".parse().unwrap();
        assert_eq!(storage.account(&alice).unwrap().unwrap().quorum, 1);
        assert!(storage
            .signatories(&alice)
            .unwrap()
            .unwrap()
            .contains(&PublicKey([1u8; 32])));
        assert_eq!(storage.peers().unwrap().len(), 1);

        let tx_hash = genesis.payload.transactions[0].hash();
        assert_eq!(storage.check(&tx_hash).unwrap(), TxPresence::Committed(1));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let genesis_hash = {
            let storage = open_storage(dir.path());
            commit_genesis(&storage).hash()
        };

        let reopened = open_storage(dir.path());
        assert_eq!(reopened.top_height().unwrap(), 1);
        assert_eq!(reopened.top_block().unwrap().unwrap().hash(), genesis_hash);
    }

    #[test]
    fn temporary_wsv_never_leaks_into_committed_state() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        commit_genesis(&storage);

        let alice: meridian_types::app::AccountId = "alice@wonderland".parse().unwrap();
        {
            let mut wsv = storage.create_temporary_wsv().unwrap();
            wsv.execute(
                &alice,
                &Command::CreateAsset {
                    asset_name: "coin".to_string(),
                    domain_id: "wonderland".parse().unwrap(),
                    precision: 2,
                },
            )
            .unwrap();
            wsv.execute(
                &alice,
                &Command::AddAssetQuantity {
                    asset_id: "coin#wonderland".parse().unwrap(),
                    amount: Amount::new(100, 2),
                },
            )
            .unwrap();
            // Dropped without commit: rolled back.
        }

        let mut mutable = storage.create_mutable_storage().unwrap();
        // The asset must not exist in committed state.
        let probe = Command::AddAssetQuantity {
            asset_id: "coin#wonderland".parse().unwrap(),
            amount: Amount::new(1, 2),
        };
        assert!(meridian_api::state::MutableStorage::apply(
            &mut *mutable,
            &Block::new(BlockPayload {
                height: 2,
                prev_hash: storage.top_block().unwrap().unwrap().hash(),
                created_time: 1,
                transactions: vec![Transaction::new(TransactionPayload {
                    creator_account_id: alice,
                    created_time: 1,
                    quorum: 1,
                    commands: vec![probe],
                })],
                rejected_transactions_hashes: vec![],
            })
        )
        .is_err());
    }

    #[test]
    fn drop_ledger_resets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        commit_genesis(&storage);

        storage.drop_ledger().unwrap();
        assert_eq!(storage.top_height().unwrap(), 0);
        assert_eq!(storage.block_store().size().unwrap(), 0);
        assert_eq!(storage.peers().unwrap(), vec![]);
    }

    #[test]
    fn rejected_hashes_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        let genesis = commit_genesis(&storage);

        let rejected = Hash::of(b"rejected-tx");
        let block = Block::new(BlockPayload {
            height: 2,
            prev_hash: genesis.hash(),
            created_time: 5,
            transactions: vec![],
            rejected_transactions_hashes: vec![rejected],
        });
        let mut mutable = storage.create_mutable_storage().unwrap();
        mutable.apply(&block).unwrap();
        mutable.commit().unwrap();

        assert_eq!(storage.check(&rejected).unwrap(), TxPresence::Rejected(2));
    }
}
