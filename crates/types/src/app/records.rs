// Path: crates/types/src/app/records.rs
//! World-state records: the decoded forms of the values stored by the
//! world-state backend.

use super::{AccountId, AssetId, DomainId, RoleName};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The stored record of an account.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Account {
    /// The account identifier.
    pub id: AccountId,
    /// Number of signatories required on this account's transactions.
    pub quorum: u32,
}

/// The stored record of an asset.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Asset {
    /// The asset identifier.
    pub id: AssetId,
    /// Number of decimal places amounts of this asset carry.
    pub precision: u8,
}

/// The stored record of a domain.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Domain {
    /// The domain identifier.
    pub id: DomainId,
    /// The role attached to accounts created in this domain.
    pub default_role: RoleName,
}
