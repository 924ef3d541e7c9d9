// Path: crates/storage/src/query_executor.rs
//! Answers client queries from committed state.
//!
//! Object queries read the world state directly; transaction queries go
//! through the secondary indexes (tx hash -> height, creator -> heights,
//! `(account, height, asset)` -> tx indexes) and fetch the blocks they
//! point at. Every failure collapses into the response's error variant.

use crate::queries;
use crate::store::Storage;
use meridian_api::state::BlockQuery;
use meridian_types::app::{
    AccountAsset, AccountId, Amount, AssetId, Hash, Query, QueryErrorReason, QueryResponse,
    Transaction,
};
use meridian_types::keys;
use tracing::warn;

fn error(reason: QueryErrorReason) -> QueryResponse {
    QueryResponse::Error { reason }
}

/// Executes one query against the committed state of `storage`.
pub fn execute_query(storage: &Storage, query: &Query) -> QueryResponse {
    let result = match query {
        Query::GetAccount { account_id } => get_account(storage, account_id),
        Query::GetSignatories { account_id } => get_signatories(storage, account_id),
        Query::GetAccountAssets {
            account_id,
            asset_id,
        } => get_account_assets(storage, account_id, asset_id),
        Query::GetRolePermissions { role_name } => {
            match queries::role_permissions(storage, role_name) {
                Ok(Some(permissions)) => Ok(QueryResponse::RolePermissions { permissions }),
                Ok(None) => Ok(error(QueryErrorReason::NoRoles)),
                Err(e) => Err(e),
            }
        }
        Query::GetTransactions { tx_hashes } => get_transactions(storage, tx_hashes),
        Query::GetAccountTransactions { account_id } => {
            get_account_transactions(storage, account_id)
        }
        Query::GetAccountAssetTransactions {
            account_id,
            asset_id,
        } => get_account_asset_transactions(storage, account_id, asset_id),
    };

    result.unwrap_or_else(|e| {
        warn!(error = %e, "query failed in the storage backend");
        error(QueryErrorReason::Internal)
    })
}

fn get_account(
    storage: &Storage,
    account_id: &AccountId,
) -> Result<QueryResponse, meridian_types::error::StorageError> {
    match queries::account(storage, account_id)? {
        Some(account) => Ok(QueryResponse::Account {
            account,
            roles: queries::account_roles(storage, account_id)?,
        }),
        None => Ok(error(QueryErrorReason::NoAccount)),
    }
}

fn get_signatories(
    storage: &Storage,
    account_id: &AccountId,
) -> Result<QueryResponse, meridian_types::error::StorageError> {
    match queries::signatories(storage, account_id)? {
        Some(signatories) => Ok(QueryResponse::Signatories {
            keys: signatories.into_iter().collect(),
        }),
        None => Ok(error(QueryErrorReason::NoSignatories)),
    }
}

fn get_account_assets(
    storage: &Storage,
    account_id: &AccountId,
    asset_id: &AssetId,
) -> Result<QueryResponse, meridian_types::error::StorageError> {
    if queries::account(storage, account_id)?.is_none() {
        return Ok(error(QueryErrorReason::NoAccount));
    }
    let Some(asset) = queries::asset(storage, asset_id)? else {
        return Ok(error(QueryErrorReason::NoAsset));
    };
    let balance = queries::balance(storage, account_id, asset_id)?
        .unwrap_or(Amount::new(0, asset.precision));
    Ok(QueryResponse::AccountAssets {
        assets: vec![AccountAsset {
            asset_id: asset_id.clone(),
            balance,
        }],
    })
}

fn get_transactions(
    storage: &Storage,
    tx_hashes: &[Hash],
) -> Result<QueryResponse, meridian_types::error::StorageError> {
    let mut transactions = Vec::new();
    for hash in tx_hashes {
        let Some(height) = queries::get_decoded::<u64>(storage, &keys::tx_committed_key(hash))?
        else {
            continue;
        };
        let Some(block) = storage.block(height)? else {
            continue;
        };
        transactions.extend(
            block
                .payload
                .transactions
                .iter()
                .filter(|tx| tx.hash() == *hash)
                .cloned(),
        );
    }
    Ok(QueryResponse::Transactions { transactions })
}

fn get_account_transactions(
    storage: &Storage,
    account_id: &AccountId,
) -> Result<QueryResponse, meridian_types::error::StorageError> {
    let heights: Vec<u64> =
        queries::get_decoded(storage, &keys::creator_heights_key(account_id))?.unwrap_or_default();
    let mut transactions = Vec::new();
    for height in heights {
        let Some(block) = storage.block(height)? else {
            continue;
        };
        transactions.extend(
            block
                .payload
                .transactions
                .iter()
                .filter(|tx| tx.payload.creator_account_id == *account_id)
                .cloned(),
        );
    }
    Ok(QueryResponse::Transactions { transactions })
}

fn get_account_asset_transactions(
    storage: &Storage,
    account_id: &AccountId,
    asset_id: &AssetId,
) -> Result<QueryResponse, meridian_types::error::StorageError> {
    let top = storage.top_height()?;
    let mut transactions: Vec<Transaction> = Vec::new();
    for height in 1..=top {
        let key = keys::account_asset_txs_key(account_id, height, asset_id);
        let indexes: Vec<u32> = match queries::get_decoded(storage, &key)? {
            Some(indexes) => indexes,
            None => continue,
        };
        let Some(block) = storage.block(height)? else {
            continue;
        };
        for index in indexes {
            if let Some(tx) = block.payload.transactions.get(index as usize) {
                transactions.push(tx.clone());
            }
        }
    }
    Ok(QueryResponse::Transactions { transactions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_api::state::{MutableFactory, MutableStorage};
    use meridian_types::app::{
        Block, BlockPayload, Command, PublicKey, RolePermissions, RoleName, TransactionPayload,
    };
    use std::path::Path;

    fn open_storage(dir: &Path) -> Storage {
        Storage::open(&dir.join("wsv.redb"), &dir.join("blocks")).unwrap()
    }

    fn tx(creator: &str, commands: Vec<Command>, created_time: u64) -> Transaction {
        Transaction::new(TransactionPayload {
            creator_account_id: creator.parse().unwrap(),
            created_time,
            quorum: 1,
            commands,
        })
    }

    fn fixture(storage: &Storage) -> (Block, Block) {
        let genesis = Block::new(BlockPayload {
            height: 1,
            prev_hash: Hash::EMPTY,
            created_time: 0,
            transactions: vec![tx(
                "admin@dom",
                vec![
                    Command::CreateRole {
                        role_name: "admin".parse().unwrap(),
                        permissions: RolePermissions::all(),
                    },
                    Command::CreateDomain {
                        domain_id: "dom".parse().unwrap(),
                        default_role: "admin".parse().unwrap(),
                    },
                    Command::CreateAccount {
                        account_name: "admin".to_string(),
                        domain_id: "dom".parse().unwrap(),
                        public_key: PublicKey([1u8; 32]),
                    },
                    Command::CreateAccount {
                        account_name: "bob".to_string(),
                        domain_id: "dom".parse().unwrap(),
                        public_key: PublicKey([2u8; 32]),
                    },
                    Command::CreateAsset {
                        asset_name: "coin".to_string(),
                        domain_id: "dom".parse().unwrap(),
                        precision: 2,
                    },
                    Command::AddAssetQuantity {
                        asset_id: "coin#dom".parse().unwrap(),
                        amount: Amount::new(1000, 2),
                    },
                ],
                0,
            )],
            rejected_transactions_hashes: vec![],
        });

        let transfer = Block::new(BlockPayload {
            height: 2,
            prev_hash: genesis.hash(),
            created_time: 10,
            transactions: vec![tx(
                "admin@dom",
                vec![Command::TransferAsset {
                    src_account_id: "admin@dom".parse().unwrap(),
                    dest_account_id: "bob@dom".parse().unwrap(),
                    asset_id: "coin#dom".parse().unwrap(),
                    description: "pay".to_string(),
                    amount: Amount::new(250, 2),
                }],
                10,
            )],
            rejected_transactions_hashes: vec![],
        });

        let mut mutable = storage.create_mutable_storage().unwrap();
        mutable.apply(&genesis).unwrap();
        mutable.apply(&transfer).unwrap();
        mutable.commit().unwrap();
        (genesis, transfer)
    }

    #[test]
    fn object_queries_answer_from_world_state() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        fixture(&storage);

        let admin: AccountId = "admin@dom".parse().unwrap();
        match execute_query(&storage, &Query::GetAccount { account_id: admin.clone() }) {
            QueryResponse::Account { account, roles } => {
                assert_eq!(account.quorum, 1);
                assert!(roles.contains(&"admin".parse::<RoleName>().unwrap()));
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match execute_query(&storage, &Query::GetSignatories { account_id: admin.clone() }) {
            QueryResponse::Signatories { keys } => assert_eq!(keys, vec![PublicKey([1u8; 32])]),
            other => panic!("unexpected response: {other:?}"),
        }

        match execute_query(
            &storage,
            &Query::GetAccountAssets {
                account_id: "bob@dom".parse().unwrap(),
                asset_id: "coin#dom".parse().unwrap(),
            },
        ) {
            QueryResponse::AccountAssets { assets } => {
                assert_eq!(assets[0].balance, Amount::new(250, 2));
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match execute_query(
            &storage,
            &Query::GetRolePermissions {
                role_name: "admin".parse().unwrap(),
            },
        ) {
            QueryResponse::RolePermissions { permissions } => {
                assert_eq!(permissions, RolePermissions::all());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn unknown_objects_answer_with_the_reason() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        fixture(&storage);

        let ghost: AccountId = "ghost@dom".parse().unwrap();
        assert_eq!(
            execute_query(&storage, &Query::GetAccount { account_id: ghost.clone() }),
            QueryResponse::Error {
                reason: QueryErrorReason::NoAccount
            }
        );
        assert_eq!(
            execute_query(
                &storage,
                &Query::GetAccountAssets {
                    account_id: "admin@dom".parse().unwrap(),
                    asset_id: "ghost#dom".parse().unwrap(),
                }
            ),
            QueryResponse::Error {
                reason: QueryErrorReason::NoAsset
            }
        );
        assert_eq!(
            execute_query(
                &storage,
                &Query::GetRolePermissions {
                    role_name: "ghost".parse().unwrap(),
                }
            ),
            QueryResponse::Error {
                reason: QueryErrorReason::NoRoles
            }
        );
    }

    #[test]
    fn transaction_queries_walk_the_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path());
        let (_genesis, transfer) = fixture(&storage);
        let transfer_hash = transfer.payload.transactions[0].hash();

        // By hash: the committed transfer is found, unknown hashes skip.
        match execute_query(
            &storage,
            &Query::GetTransactions {
                tx_hashes: vec![transfer_hash, Hash::of(b"unknown")],
            },
        ) {
            QueryResponse::Transactions { transactions } => {
                assert_eq!(transactions.len(), 1);
                assert_eq!(transactions[0].hash(), transfer_hash);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        // By creator: both the genesis and the transfer transaction.
        match execute_query(
            &storage,
            &Query::GetAccountTransactions {
                account_id: "admin@dom".parse().unwrap(),
            },
        ) {
            QueryResponse::Transactions { transactions } => assert_eq!(transactions.len(), 2),
            other => panic!("unexpected response: {other:?}"),
        }

        // By (account, asset): the transfer shows up for both sides.
        for account in ["admin@dom", "bob@dom"] {
            match execute_query(
                &storage,
                &Query::GetAccountAssetTransactions {
                    account_id: account.parse().unwrap(),
                    asset_id: "coin#dom".parse().unwrap(),
                },
            ) {
                QueryResponse::Transactions { transactions } => {
                    assert_eq!(transactions.len(), 1);
                    assert_eq!(transactions[0].hash(), transfer_hash);
                }
                other => panic!("unexpected response: {other:?}"),
            }
        }
    }
}
