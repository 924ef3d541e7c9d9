// Path: crates/api/src/state/mod.rs
//! World-state and block-storage contracts.
//!
//! The relational backend itself is replaceable; these traits fix its
//! contract. A [`TemporaryWsv`] lives for one proposal's stateful
//! validation and is rolled back on drop; a [`MutableStorage`] stages one
//! or more blocks and becomes durable only through
//! [`MutableFactory::commit`].

use meridian_types::app::{
    Account, AccountId, Block, Command, GrantablePermissions, Hash, Peer, PublicKey,
    RolePermissions, RoleName, TransactionBatch,
};
use meridian_types::error::{CommandError, StorageError};
use std::collections::BTreeSet;

/// Whether a transaction hash is already part of the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxPresence {
    /// Present in a committed block at the given height.
    Committed(u64),
    /// Recorded as stateful-rejected at the given height.
    Rejected(u64),
    /// Not known to the ledger.
    Missing,
}

/// Replay filter over the ledger: committed and rejected transaction
/// hashes.
pub trait TxPresenceCache: Send + Sync {
    /// Looks up one transaction hash.
    fn check(&self, hash: &Hash) -> Result<TxPresence, StorageError>;

    /// True if any member of the batch is already present in the ledger.
    fn batch_already_processed(&self, batch: &TransactionBatch) -> Result<bool, StorageError> {
        for tx in &batch.transactions {
            if self.check(&tx.hash())? != TxPresence::Missing {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Access to the committed validator set, used by gossip and by peer
/// ordering in consensus.
pub trait PeerQuery: Send + Sync {
    /// The ordered validator set as of the last committed block.
    fn ledger_peers(&self) -> Result<Vec<Peer>, StorageError>;
}

/// Read queries over a world-state view, used by the stateful validator
/// and by peer ordering.
pub trait WsvQuery {
    /// The account record, if the account exists.
    fn account(&self, id: &AccountId) -> Result<Option<Account>, StorageError>;

    /// The registered signatories of an account.
    fn signatories(&self, id: &AccountId) -> Result<Option<BTreeSet<PublicKey>>, StorageError>;

    /// The roles attached to an account.
    fn account_roles(&self, id: &AccountId) -> Result<BTreeSet<RoleName>, StorageError>;

    /// The permission set of a role, if the role exists.
    fn role_permissions(&self, role: &RoleName) -> Result<Option<RolePermissions>, StorageError>;

    /// The union of the permission sets of all roles attached to an
    /// account.
    fn account_permissions(&self, id: &AccountId) -> Result<RolePermissions, StorageError> {
        let mut permissions = RolePermissions::empty();
        for role in self.account_roles(id)? {
            if let Some(role_permissions) = self.role_permissions(&role)? {
                permissions |= role_permissions;
            }
        }
        Ok(permissions)
    }

    /// The permissions `grantor` has granted `grantee`.
    fn granted_permissions(
        &self,
        grantor: &AccountId,
        grantee: &AccountId,
    ) -> Result<GrantablePermissions, StorageError>;

    /// The ordered validator set as of the view's state.
    fn peers(&self) -> Result<Vec<Peer>, StorageError>;
}

/// A world-state view opened within an uncommitted storage transaction.
///
/// Dropping the view rolls everything back. Savepoints nest as a stack:
/// an inner savepoint must be released or rolled back before its outer
/// one.
pub trait TemporaryWsv: WsvQuery + Send {
    /// Pushes a named savepoint.
    fn savepoint(&mut self, name: &str) -> Result<(), StorageError>;

    /// Folds the named savepoint (which must be the innermost) into its
    /// parent.
    fn release_savepoint(&mut self, name: &str) -> Result<(), StorageError>;

    /// Discards all changes made since the named savepoint (which must be
    /// the innermost).
    fn rollback_savepoint(&mut self, name: &str) -> Result<(), StorageError>;

    /// Executes one command on behalf of `creator`. Integrity failures
    /// (missing objects, balance underflow, quorum constraints) surface as
    /// typed command errors; permission checks are the validator's duty.
    fn execute(&mut self, creator: &AccountId, command: &Command) -> Result<(), CommandError>;
}

/// Opens temporary world-state views.
pub trait TemporaryFactory: Send + Sync {
    /// Begins a top-level world-state transaction that will be rolled
    /// back unless explicitly committed (which a temporary view never is).
    fn create_temporary_wsv(&self) -> Result<Box<dyn TemporaryWsv>, StorageError>;
}

/// A mutable storage transaction: applies whole blocks (world state,
/// block file, secondary indexes) and becomes durable on commit.
pub trait MutableStorage: WsvQuery + Send {
    /// Applies a block on top of the staged state. Command execution
    /// failures surface as [`StorageError::ApplyFailed`].
    fn apply(&mut self, block: &Block) -> Result<(), StorageError>;

    /// Height of the top block as staged (committed top plus applied
    /// blocks).
    fn top_height(&self) -> u64;

    /// Payload hash of the staged top block.
    fn top_hash(&self) -> Hash;

    /// Commits the staged blocks durably; returns them in apply order.
    /// Dropping the storage without committing rolls everything back.
    fn commit(self: Box<Self>) -> Result<Vec<Block>, StorageError>;
}

/// Creates mutable storage transactions.
pub trait MutableFactory: Send + Sync {
    /// Opens a mutable storage transaction over the committed state.
    fn create_mutable_storage(&self) -> Result<Box<dyn MutableStorage>, StorageError>;
}

/// Read access to committed blocks.
pub trait BlockQuery: Send + Sync {
    /// The most recently committed block.
    fn top_block(&self) -> Result<Option<Block>, StorageError>;

    /// Height of the most recently committed block; 0 before genesis.
    fn top_height(&self) -> Result<u64, StorageError>;

    /// The committed block at the given height.
    fn block(&self, height: u64) -> Result<Option<Block>, StorageError>;

    /// The committed block with the given payload hash.
    fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError>;
}

/// The append-only block store, keyed by height.
pub trait BlockStore: Send + Sync {
    /// Inserts a block at the given height.
    fn insert(&self, height: u64, block: &Block) -> Result<(), StorageError>;

    /// Fetches the block at the given height.
    fn fetch(&self, height: u64) -> Result<Option<Block>, StorageError>;

    /// Visits every stored block in height order.
    fn for_each(&self, f: &mut dyn FnMut(&Block)) -> Result<(), StorageError>;

    /// Number of stored blocks.
    fn size(&self) -> Result<u64, StorageError>;

    /// Removes every stored block.
    fn clear(&self) -> Result<(), StorageError>;
}
