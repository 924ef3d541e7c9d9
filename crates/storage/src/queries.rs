// Path: crates/storage/src/queries.rs
//! Decoding world-state queries shared by every view.
//!
//! Temporary views, mutable transactions and the committed database all
//! answer the same queries; the decoding logic is written once here
//! against [`KvRead`].

use crate::access::KvRead;
use meridian_types::app::{
    Account, AccountId, Amount, Asset, AssetId, GrantablePermissions, Peer, PublicKey,
    RolePermissions, RoleName,
};
use meridian_types::error::StorageError;
use meridian_types::{codec, keys};
use parity_scale_codec::Decode;
use std::collections::BTreeSet;

/// Reads and decodes the value under `key`.
pub fn get_decoded<T: Decode>(
    access: &(impl KvRead + ?Sized),
    key: &[u8],
) -> Result<Option<T>, StorageError> {
    match access.get_raw(key)? {
        Some(bytes) => codec::from_bytes_canonical(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Decode(e.to_string())),
        None => Ok(None),
    }
}

/// The account record, if the account exists.
pub fn account(access: &(impl KvRead + ?Sized), id: &AccountId) -> Result<Option<Account>, StorageError> {
    get_decoded(access, &keys::account_key(id))
}

/// The registered signatories of an account.
pub fn signatories(
    access: &(impl KvRead + ?Sized),
    id: &AccountId,
) -> Result<Option<BTreeSet<PublicKey>>, StorageError> {
    get_decoded(access, &keys::signatories_key(id))
}

/// The roles attached to an account; empty for unknown accounts.
pub fn account_roles(
    access: &(impl KvRead + ?Sized),
    id: &AccountId,
) -> Result<BTreeSet<RoleName>, StorageError> {
    Ok(get_decoded(access, &keys::account_roles_key(id))?.unwrap_or_default())
}

/// The permission set of a role, if the role exists.
pub fn role_permissions(
    access: &(impl KvRead + ?Sized),
    role: &RoleName,
) -> Result<Option<RolePermissions>, StorageError> {
    get_decoded(access, &keys::role_key(role))
}

/// The permissions `grantor` has granted `grantee`; empty if none.
pub fn granted_permissions(
    access: &(impl KvRead + ?Sized),
    grantor: &AccountId,
    grantee: &AccountId,
) -> Result<GrantablePermissions, StorageError> {
    Ok(get_decoded(access, &keys::grant_key(grantor, grantee))?.unwrap_or_default())
}

/// The ordered validator set; empty before genesis.
pub fn peers(access: &(impl KvRead + ?Sized)) -> Result<Vec<Peer>, StorageError> {
    Ok(get_decoded(access, keys::PEERS_KEY)?.unwrap_or_default())
}

/// The asset record, if the asset exists.
pub fn asset(
    access: &(impl KvRead + ?Sized),
    id: &AssetId,
) -> Result<Option<Asset>, StorageError> {
    get_decoded(access, &keys::asset_key(id))
}

/// The balance of `account` in `asset`, if any was ever set.
pub fn balance(
    access: &(impl KvRead + ?Sized),
    account: &AccountId,
    asset: &AssetId,
) -> Result<Option<Amount>, StorageError> {
    get_decoded(access, &keys::balance_key(account, asset))
}

/// Implements `meridian_api::state::WsvQuery` for a [`KvRead`] view by
/// delegating to the free functions of this module.
#[macro_export]
macro_rules! impl_wsv_query {
    ($ty:ty) => {
        impl meridian_api::state::WsvQuery for $ty {
            fn account(
                &self,
                id: &meridian_types::app::AccountId,
            ) -> Result<Option<meridian_types::app::Account>, meridian_types::error::StorageError>
            {
                $crate::queries::account(self, id)
            }

            fn signatories(
                &self,
                id: &meridian_types::app::AccountId,
            ) -> Result<
                Option<std::collections::BTreeSet<meridian_types::app::PublicKey>>,
                meridian_types::error::StorageError,
            > {
                $crate::queries::signatories(self, id)
            }

            fn account_roles(
                &self,
                id: &meridian_types::app::AccountId,
            ) -> Result<
                std::collections::BTreeSet<meridian_types::app::RoleName>,
                meridian_types::error::StorageError,
            > {
                $crate::queries::account_roles(self, id)
            }

            fn role_permissions(
                &self,
                role: &meridian_types::app::RoleName,
            ) -> Result<
                Option<meridian_types::app::RolePermissions>,
                meridian_types::error::StorageError,
            > {
                $crate::queries::role_permissions(self, role)
            }

            fn granted_permissions(
                &self,
                grantor: &meridian_types::app::AccountId,
                grantee: &meridian_types::app::AccountId,
            ) -> Result<
                meridian_types::app::GrantablePermissions,
                meridian_types::error::StorageError,
            > {
                $crate::queries::granted_permissions(self, grantor, grantee)
            }

            fn peers(
                &self,
            ) -> Result<Vec<meridian_types::app::Peer>, meridian_types::error::StorageError> {
                $crate::queries::peers(self)
            }
        }
    };
}
