// Path: crates/types/src/app/command.rs
//! The command grammar of the ledger and its permission sets.

use super::{AccountId, Amount, AssetId, DomainId, Peer, PublicKey, RoleName};
use parity_scale_codec::{Decode, Encode, Error as CodecError, Input, Output};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags::bitflags! {
    /// Role-level permissions. A creator account accumulates the union of
    /// the permission sets of all roles attached to it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct RolePermissions: u32 {
        /// Issue units of an asset to the creator's own balance.
        const ADD_ASSET_QTY = 1 << 0;
        /// Burn units of an asset from the creator's own balance.
        const SUBTRACT_ASSET_QTY = 1 << 1;
        /// Transfer assets out of an account.
        const TRANSFER = 1 << 2;
        /// Receive transferred assets.
        const RECEIVE = 1 << 3;
        /// Create accounts.
        const CREATE_ACCOUNT = 1 << 4;
        /// Create assets.
        const CREATE_ASSET = 1 << 5;
        /// Create domains.
        const CREATE_DOMAIN = 1 << 6;
        /// Create roles.
        const CREATE_ROLE = 1 << 7;
        /// Attach a role to an account.
        const APPEND_ROLE = 1 << 8;
        /// Detach a role from an account.
        const DETACH_ROLE = 1 << 9;
        /// Add a signatory to any account.
        const ADD_SIGNATORY = 1 << 10;
        /// Remove a signatory from any account.
        const REMOVE_SIGNATORY = 1 << 11;
        /// Set the quorum of any account.
        const SET_QUORUM = 1 << 12;
        /// Set a detail on any account.
        const SET_DETAIL = 1 << 13;
        /// Add a peer to the validator set.
        const ADD_PEER = 1 << 14;
        /// Grant `AddMySignatory` to another account.
        const GRANT_ADD_MY_SIGNATORY = 1 << 15;
        /// Grant `RemoveMySignatory` to another account.
        const GRANT_REMOVE_MY_SIGNATORY = 1 << 16;
        /// Grant `SetMyQuorum` to another account.
        const GRANT_SET_MY_QUORUM = 1 << 17;
        /// Grant `SetMyAccountDetail` to another account.
        const GRANT_SET_MY_ACCOUNT_DETAIL = 1 << 18;
        /// Grant `TransferMyAssets` to another account.
        const GRANT_TRANSFER_MY_ASSETS = 1 << 19;
    }
}

bitflags::bitflags! {
    /// The set of grantable permissions one account has granted another.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct GrantablePermissions: u32 {
        /// Add a signatory to the granting account.
        const ADD_MY_SIGNATORY = 1 << 0;
        /// Remove a signatory from the granting account.
        const REMOVE_MY_SIGNATORY = 1 << 1;
        /// Set the quorum of the granting account.
        const SET_MY_QUORUM = 1 << 2;
        /// Set a detail on the granting account.
        const SET_MY_ACCOUNT_DETAIL = 1 << 3;
        /// Transfer assets out of the granting account.
        const TRANSFER_MY_ASSETS = 1 << 4;
    }
}

/// A single grantable permission, as named by grant/revoke commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum GrantablePermission {
    /// Add a signatory to the granting account.
    AddMySignatory,
    /// Remove a signatory from the granting account.
    RemoveMySignatory,
    /// Set the quorum of the granting account.
    SetMyQuorum,
    /// Set a detail on the granting account.
    SetMyAccountDetail,
    /// Transfer assets out of the granting account.
    TransferMyAssets,
}

impl GrantablePermission {
    /// The bit this permission occupies in a stored grant set.
    pub fn as_flag(self) -> GrantablePermissions {
        match self {
            Self::AddMySignatory => GrantablePermissions::ADD_MY_SIGNATORY,
            Self::RemoveMySignatory => GrantablePermissions::REMOVE_MY_SIGNATORY,
            Self::SetMyQuorum => GrantablePermissions::SET_MY_QUORUM,
            Self::SetMyAccountDetail => GrantablePermissions::SET_MY_ACCOUNT_DETAIL,
            Self::TransferMyAssets => GrantablePermissions::TRANSFER_MY_ASSETS,
        }
    }

    /// The role permission a creator needs to grant this permission.
    pub fn required_to_grant(self) -> RolePermissions {
        match self {
            Self::AddMySignatory => RolePermissions::GRANT_ADD_MY_SIGNATORY,
            Self::RemoveMySignatory => RolePermissions::GRANT_REMOVE_MY_SIGNATORY,
            Self::SetMyQuorum => RolePermissions::GRANT_SET_MY_QUORUM,
            Self::SetMyAccountDetail => RolePermissions::GRANT_SET_MY_ACCOUNT_DETAIL,
            Self::TransferMyAssets => RolePermissions::GRANT_TRANSFER_MY_ASSETS,
        }
    }
}

macro_rules! bitset_codec {
    ($ty:ty) => {
        impl Encode for $ty {
            fn encode_to<O: Output + ?Sized>(&self, dest: &mut O) {
                self.bits().encode_to(dest);
            }
        }

        impl Decode for $ty {
            fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
                let bits = u32::decode(input)?;
                <$ty>::from_bits(bits).ok_or_else(|| "unknown permission bits".into())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut out = String::new();
                bitflags::parser::to_writer(self, &mut out).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&out)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                bitflags::parser::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

bitset_codec!(RolePermissions);
bitset_codec!(GrantablePermissions);

/// A world-state mutation. Each kind carries the fields required for it;
/// validation rules are per kind and enforced by the command executor.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Issue `amount` of `asset_id` to the creator's balance.
    AddAssetQuantity {
        /// The asset to issue.
        asset_id: AssetId,
        /// The amount to issue.
        amount: Amount,
    },
    /// Burn `amount` of `asset_id` from the creator's balance.
    SubtractAssetQuantity {
        /// The asset to burn.
        asset_id: AssetId,
        /// The amount to burn.
        amount: Amount,
    },
    /// Move `amount` of `asset_id` from one account to another.
    TransferAsset {
        /// The account debited.
        src_account_id: AccountId,
        /// The account credited.
        dest_account_id: AccountId,
        /// The transferred asset.
        asset_id: AssetId,
        /// Free-form transfer description.
        description: String,
        /// The transferred amount.
        amount: Amount,
    },
    /// Register a new account in an existing domain.
    CreateAccount {
        /// The account name within the domain.
        account_name: String,
        /// The domain the account is created in.
        domain_id: DomainId,
        /// The account's first signatory.
        public_key: PublicKey,
    },
    /// Register a new asset in an existing domain.
    CreateAsset {
        /// The asset name within the domain.
        asset_name: String,
        /// The domain the asset is created in.
        domain_id: DomainId,
        /// Number of decimal places.
        precision: u8,
    },
    /// Register a new domain.
    CreateDomain {
        /// The new domain identifier.
        domain_id: DomainId,
        /// The role attached to accounts created in this domain.
        default_role: RoleName,
    },
    /// Register a new role.
    CreateRole {
        /// The new role name.
        role_name: RoleName,
        /// The permissions the role carries.
        permissions: RolePermissions,
    },
    /// Attach a role to an account.
    AppendRole {
        /// The target account.
        account_id: AccountId,
        /// The role to attach.
        role_name: RoleName,
    },
    /// Detach a role from an account.
    DetachRole {
        /// The target account.
        account_id: AccountId,
        /// The role to detach.
        role_name: RoleName,
    },
    /// Grant a grantable permission over the creator's account.
    GrantPermission {
        /// The account receiving the permission.
        account_id: AccountId,
        /// The granted permission.
        permission: GrantablePermission,
    },
    /// Revoke a previously granted permission.
    RevokePermission {
        /// The account losing the permission.
        account_id: AccountId,
        /// The revoked permission.
        permission: GrantablePermission,
    },
    /// Add a signatory to an account.
    AddSignatory {
        /// The target account.
        account_id: AccountId,
        /// The signatory to add.
        public_key: PublicKey,
    },
    /// Remove a signatory from an account.
    RemoveSignatory {
        /// The target account.
        account_id: AccountId,
        /// The signatory to remove.
        public_key: PublicKey,
    },
    /// Set the signature quorum of an account.
    SetQuorum {
        /// The target account.
        account_id: AccountId,
        /// The new quorum.
        quorum: u32,
    },
    /// Set a key-value detail on an account.
    SetAccountDetail {
        /// The target account.
        account_id: AccountId,
        /// The detail key.
        key: String,
        /// The detail value.
        value: String,
    },
    /// Add a peer to the validator set.
    AddPeer {
        /// The peer to add.
        peer: Peer,
    },
}

impl Command {
    /// The stable name of this command kind, used in command errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddAssetQuantity { .. } => "AddAssetQuantity",
            Self::SubtractAssetQuantity { .. } => "SubtractAssetQuantity",
            Self::TransferAsset { .. } => "TransferAsset",
            Self::CreateAccount { .. } => "CreateAccount",
            Self::CreateAsset { .. } => "CreateAsset",
            Self::CreateDomain { .. } => "CreateDomain",
            Self::CreateRole { .. } => "CreateRole",
            Self::AppendRole { .. } => "AppendRole",
            Self::DetachRole { .. } => "DetachRole",
            Self::GrantPermission { .. } => "GrantPermission",
            Self::RevokePermission { .. } => "RevokePermission",
            Self::AddSignatory { .. } => "AddSignatory",
            Self::RemoveSignatory { .. } => "RemoveSignatory",
            Self::SetQuorum { .. } => "SetQuorum",
            Self::SetAccountDetail { .. } => "SetAccountDetail",
            Self::AddPeer { .. } => "AddPeer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn permission_bits_roundtrip_scale() {
        let perms = RolePermissions::TRANSFER | RolePermissions::RECEIVE;
        let bytes = codec::to_bytes_canonical(&perms);
        let back: RolePermissions = codec::from_bytes_canonical(&bytes).unwrap();
        assert_eq!(perms, back);
    }

    #[test]
    fn unknown_permission_bits_are_rejected() {
        let bytes = codec::to_bytes_canonical(&u32::MAX);
        assert!(codec::from_bytes_canonical::<RolePermissions>(&bytes).is_err());
    }

    #[test]
    fn permission_names_roundtrip_serde() {
        let perms = RolePermissions::CREATE_ACCOUNT | RolePermissions::ADD_PEER;
        let json = serde_json::to_string(&perms).unwrap();
        assert!(json.contains("CREATE_ACCOUNT"));
        let back: RolePermissions = serde_json::from_str(&json).unwrap();
        assert_eq!(perms, back);
    }

    #[test]
    fn command_json_is_tagged() {
        let cmd = Command::SetQuorum {
            account_id: "alice@wonderland".parse().unwrap(),
            quorum: 2,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "SetQuorum");
        let back: Command = serde_json::from_value(json).unwrap();
        assert_eq!(cmd, back);
    }
}
