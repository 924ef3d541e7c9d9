// Path: crates/types/src/app/query.rs
//! Client queries over committed world state and their responses.
//!
//! Queries never reach uncommitted state: they are answered from the
//! last committed block's world state and the secondary indexes. Errors
//! surface only as the [`QueryResponse::Error`] variant, never through
//! the service signature.

use super::{Account, AccountId, Amount, AssetId, Block, Hash, PublicKey, RolePermissions, RoleName};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A client query against committed state.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Query {
    /// The account record and its attached roles.
    GetAccount {
        /// The queried account.
        account_id: AccountId,
    },
    /// The registered signatories of an account.
    GetSignatories {
        /// The queried account.
        account_id: AccountId,
    },
    /// An account's balance in one asset.
    GetAccountAssets {
        /// The queried account.
        account_id: AccountId,
        /// The queried asset.
        asset_id: AssetId,
    },
    /// The permission set of a role.
    GetRolePermissions {
        /// The queried role.
        role_name: RoleName,
    },
    /// Committed transactions by payload hash; unknown hashes are
    /// silently skipped.
    GetTransactions {
        /// The queried payload hashes.
        tx_hashes: Vec<Hash>,
    },
    /// Every committed transaction created by an account.
    GetAccountTransactions {
        /// The creator account.
        account_id: AccountId,
    },
    /// Committed asset-transfer transactions touching `(account, asset)`.
    GetAccountAssetTransactions {
        /// The account on either side of the transfer.
        account_id: AccountId,
        /// The transferred asset.
        asset_id: AssetId,
    },
}

/// Why a query could not be answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum QueryErrorReason {
    /// The queried account does not exist.
    NoAccount,
    /// The queried asset does not exist.
    NoAsset,
    /// The queried account has no signatory set.
    NoSignatories,
    /// The queried role does not exist.
    NoRoles,
    /// The backend failed while answering.
    Internal,
}

/// One asset position of an account.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountAsset {
    /// The asset.
    pub asset_id: AssetId,
    /// The account's balance in it.
    pub balance: Amount,
}

/// The response to a [`Query`].
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueryResponse {
    /// Response to [`Query::GetAccount`].
    Account {
        /// The account record.
        account: Account,
        /// The roles attached to it.
        roles: BTreeSet<RoleName>,
    },
    /// Response to [`Query::GetSignatories`].
    Signatories {
        /// The registered signatories, in key order.
        keys: Vec<PublicKey>,
    },
    /// Response to [`Query::GetAccountAssets`].
    AccountAssets {
        /// The queried positions.
        assets: Vec<AccountAsset>,
    },
    /// Response to [`Query::GetRolePermissions`].
    RolePermissions {
        /// The role's permission set.
        permissions: RolePermissions,
    },
    /// Response to the transaction queries.
    Transactions {
        /// The matching committed transactions, in chain order.
        transactions: Vec<super::Transaction>,
    },
    /// The query failed; the reason is the whole answer.
    Error {
        /// Why the query failed.
        reason: QueryErrorReason,
    },
}

/// One element of the committed-block stream.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BlockResponse {
    /// The committed block.
    pub block: Block,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn query_roundtrips_scale_and_json() {
        let query = Query::GetAccountAssets {
            account_id: "alice@wonderland".parse().unwrap(),
            asset_id: "coin#wonderland".parse().unwrap(),
        };
        let bytes = codec::to_bytes_canonical(&query);
        assert_eq!(codec::from_bytes_canonical::<Query>(&bytes).unwrap(), query);

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["type"], "GetAccountAssets");
        assert_eq!(serde_json::from_value::<Query>(json).unwrap(), query);
    }

    #[test]
    fn error_response_carries_only_the_reason() {
        let response = QueryResponse::Error {
            reason: QueryErrorReason::NoAccount,
        };
        let bytes = codec::to_bytes_canonical(&response);
        assert_eq!(
            codec::from_bytes_canonical::<QueryResponse>(&bytes).unwrap(),
            response
        );
    }
}
