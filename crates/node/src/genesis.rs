// Path: crates/node/src/genesis.rs
//! Genesis block loading, validation and installation.
//!
//! The genesis block is JSON (height 1, zero previous hash, at least one
//! bootstrap signature) and installs the initial roles, domains,
//! accounts and the validator set. It is applied through the same
//! mutable-storage path as any agreed block.

use meridian_api::state::{BlockQuery, MutableFactory};
use meridian_storage::Storage;
use meridian_types::app::{Block, Hash};
use meridian_types::error::{ConfigError, StorageError};
use std::path::Path;
use tracing::info;

/// Reads a genesis block from a JSON file.
pub fn load_genesis_block(path: &Path) -> Result<Block, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let block: Block = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    validate_genesis(&block).map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })?;
    Ok(block)
}

fn validate_genesis(block: &Block) -> Result<(), String> {
    if block.height() != 1 {
        return Err(format!("genesis height must be 1, got {}", block.height()));
    }
    if block.payload.prev_hash != Hash::EMPTY {
        return Err("genesis prev_hash must be all zeroes".to_string());
    }
    if block.signatures.is_empty() {
        return Err("genesis block carries no bootstrap signature".to_string());
    }
    let payload_hash = block.hash();
    for signature in block.signatures.iter() {
        if !meridian_crypto::verify(&signature, &payload_hash.0) {
            return Err(format!(
                "invalid bootstrap signature by {}",
                signature.public_key
            ));
        }
    }
    Ok(())
}

/// Applies the genesis block if the ledger is empty; a no-op otherwise.
pub fn install_genesis(storage: &Storage, block: &Block) -> Result<(), StorageError> {
    if storage.top_height()? != 0 {
        info!("ledger already initialized; genesis skipped");
        return Ok(());
    }
    let mut mutable = storage.create_mutable_storage()?;
    mutable.apply(block)?;
    mutable.commit()?;
    info!(hash = %block.hash(), "genesis block installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_crypto::KeyPair;
    use meridian_types::app::{BlockPayload, Command, RolePermissions};

    fn signed_genesis(pair: &KeyPair) -> Block {
        let mut block = Block::new(BlockPayload {
            height: 1,
            prev_hash: Hash::EMPTY,
            created_time: 0,
            transactions: vec![meridian_types::app::Transaction::new(
                meridian_types::app::TransactionPayload {
                    creator_account_id: "genesis@meridian".parse().unwrap(),
                    created_time: 0,
                    quorum: 1,
                    commands: vec![Command::CreateRole {
                        role_name: "admin".parse().unwrap(),
                        permissions: RolePermissions::all(),
                    }],
                },
            )],
            rejected_transactions_hashes: vec![],
        });
        let hash = block.hash();
        block.add_signature(pair.sign_hash(&hash));
        block
    }

    #[test]
    fn json_roundtrip_and_validation() {
        let pair = KeyPair::generate();
        let block = signed_genesis(&pair);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        std::fs::write(&path, serde_json::to_string_pretty(&block).unwrap()).unwrap();

        let loaded = load_genesis_block(&path).unwrap();
        assert_eq!(loaded.hash(), block.hash());
    }

    #[test]
    fn unsigned_genesis_is_rejected() {
        let pair = KeyPair::generate();
        let mut block = signed_genesis(&pair);
        block.signatures = Default::default();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        std::fs::write(&path, serde_json::to_string(&block).unwrap()).unwrap();
        assert!(load_genesis_block(&path).is_err());
    }

    #[test]
    fn install_is_idempotent() {
        let pair = KeyPair::generate();
        let block = signed_genesis(&pair);
        let dir = tempfile::tempdir().unwrap();
        let storage =
            Storage::open(&dir.path().join("wsv.redb"), &dir.path().join("blocks")).unwrap();

        install_genesis(&storage, &block).unwrap();
        install_genesis(&storage, &block).unwrap();
        assert_eq!(storage.top_height().unwrap(), 1);
    }
}
