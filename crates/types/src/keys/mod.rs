// Path: crates/types/src/keys/mod.rs
//! Defines constants and builders for well-known world-state keys.
//!
//! These provide a single source of truth for the keys under which ledger
//! data lives in the world-state backend. Using these builders prevents
//! typos and guarantees that the command executor, the queries and the
//! secondary indexes agree on one layout.

use crate::app::{AccountId, AssetId, DomainId, Hash, PublicKey, RoleName};

/// The state key for the ordered validator set (`Vec<Peer>`).
pub const PEERS_KEY: &[u8] = b"wsv::peers";

/// The state key for the height of the top committed block (`u64`).
pub const TOP_HEIGHT_KEY: &[u8] = b"wsv::top_height";

/// The state key for the payload hash of the top committed block (`Hash`).
pub const TOP_HASH_KEY: &[u8] = b"wsv::top_hash";

/// State key prefix for account records (`Account`).
pub const ACCOUNT_PREFIX: &[u8] = b"account::";
/// State key prefix for an account's signatory set (`BTreeSet<PublicKey>`).
pub const SIGNATORIES_PREFIX: &[u8] = b"account::signatories::";
/// State key prefix for an account's attached roles (`BTreeSet<RoleName>`).
pub const ACCOUNT_ROLES_PREFIX: &[u8] = b"account::roles::";
/// State key prefix for account details (`String`).
pub const ACCOUNT_DETAIL_PREFIX: &[u8] = b"account::detail::";
/// State key prefix for asset balances (`Amount`).
pub const BALANCE_PREFIX: &[u8] = b"account::balance::";
/// State key prefix for domain records (`Domain`).
pub const DOMAIN_PREFIX: &[u8] = b"domain::";
/// State key prefix for asset records (`Asset`).
pub const ASSET_PREFIX: &[u8] = b"asset::";
/// State key prefix for a role's permission set (`RolePermissions`).
pub const ROLE_PREFIX: &[u8] = b"role::";
/// State key prefix for granted permissions (`GrantablePermissions`),
/// keyed by granting account then grantee.
pub const GRANT_PREFIX: &[u8] = b"grant::";

/// Index prefix: committed transaction hash -> block height (`u64`).
pub const TX_COMMITTED_PREFIX: &[u8] = b"index::tx::committed::";
/// Index prefix: rejected transaction hash -> block height (`u64`).
pub const TX_REJECTED_PREFIX: &[u8] = b"index::tx::rejected::";
/// Index prefix: creator account -> heights of blocks it created
/// transactions in (`Vec<u64>`).
pub const CREATOR_HEIGHTS_PREFIX: &[u8] = b"index::creator::";
/// Index prefix: `(account, height, asset)` -> transaction indexes within
/// the block (`Vec<u32>`).
pub const ACCOUNT_ASSET_TXS_PREFIX: &[u8] = b"index::account_asset::";
/// Index prefix: block payload hash -> block height (`u64`).
pub const BLOCK_HASH_PREFIX: &[u8] = b"index::block::";

fn join(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(b'/');
        }
        out.extend_from_slice(part);
    }
    out
}

/// Key of an account record.
pub fn account_key(id: &AccountId) -> Vec<u8> {
    join(ACCOUNT_PREFIX, &[id.to_string().as_bytes()])
}

/// Key of an account's signatory set.
pub fn signatories_key(id: &AccountId) -> Vec<u8> {
    join(SIGNATORIES_PREFIX, &[id.to_string().as_bytes()])
}

/// Key of an account's attached role set.
pub fn account_roles_key(id: &AccountId) -> Vec<u8> {
    join(ACCOUNT_ROLES_PREFIX, &[id.to_string().as_bytes()])
}

/// Key of one account detail, scoped by the account that wrote it.
pub fn account_detail_key(id: &AccountId, writer: &AccountId, detail: &str) -> Vec<u8> {
    join(
        ACCOUNT_DETAIL_PREFIX,
        &[
            id.to_string().as_bytes(),
            writer.to_string().as_bytes(),
            detail.as_bytes(),
        ],
    )
}

/// Key of an account's balance in one asset.
pub fn balance_key(account: &AccountId, asset: &AssetId) -> Vec<u8> {
    join(
        BALANCE_PREFIX,
        &[account.to_string().as_bytes(), asset.to_string().as_bytes()],
    )
}

/// Key of a domain record.
pub fn domain_key(id: &DomainId) -> Vec<u8> {
    join(DOMAIN_PREFIX, &[id.to_string().as_bytes()])
}

/// Key of an asset record.
pub fn asset_key(id: &AssetId) -> Vec<u8> {
    join(ASSET_PREFIX, &[id.to_string().as_bytes()])
}

/// Key of a role's permission set.
pub fn role_key(name: &RoleName) -> Vec<u8> {
    join(ROLE_PREFIX, &[name.to_string().as_bytes()])
}

/// Key of the permissions `grantor` has granted `grantee`.
pub fn grant_key(grantor: &AccountId, grantee: &AccountId) -> Vec<u8> {
    join(
        GRANT_PREFIX,
        &[
            grantor.to_string().as_bytes(),
            grantee.to_string().as_bytes(),
        ],
    )
}

/// Index key of a committed transaction hash.
pub fn tx_committed_key(hash: &Hash) -> Vec<u8> {
    join(TX_COMMITTED_PREFIX, &[&hash.0])
}

/// Index key of a rejected transaction hash.
pub fn tx_rejected_key(hash: &Hash) -> Vec<u8> {
    join(TX_REJECTED_PREFIX, &[&hash.0])
}

/// Index key of the block heights a creator account appears in.
pub fn creator_heights_key(creator: &AccountId) -> Vec<u8> {
    join(CREATOR_HEIGHTS_PREFIX, &[creator.to_string().as_bytes()])
}

/// Index key of the transaction indexes touching `(account, asset)` in the
/// block at `height`.
pub fn account_asset_txs_key(account: &AccountId, height: u64, asset: &AssetId) -> Vec<u8> {
    join(
        ACCOUNT_ASSET_TXS_PREFIX,
        &[
            account.to_string().as_bytes(),
            &height.to_be_bytes(),
            asset.to_string().as_bytes(),
        ],
    )
}

/// Index key of a block payload hash.
pub fn block_hash_key(hash: &Hash) -> Vec<u8> {
    join(BLOCK_HASH_PREFIX, &[&hash.0])
}

/// A signatory's hex form, used inside composite keys.
pub fn signatory_part(key: &PublicKey) -> Vec<u8> {
    key.hex().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_and_distinct() {
        let alice: AccountId = "alice@wonderland".parse().unwrap();
        let bob: AccountId = "bob@wonderland".parse().unwrap();
        let coin: AssetId = "coin#wonderland".parse().unwrap();

        assert!(account_key(&alice).starts_with(ACCOUNT_PREFIX));
        assert_ne!(account_key(&alice), account_key(&bob));
        assert_ne!(balance_key(&alice, &coin), balance_key(&bob, &coin));
        assert_ne!(grant_key(&alice, &bob), grant_key(&bob, &alice));
        assert_ne!(
            account_asset_txs_key(&alice, 1, &coin),
            account_asset_txs_key(&alice, 2, &coin)
        );
    }
}
