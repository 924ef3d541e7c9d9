// Path: crates/types/src/app/mod.rs
//! Application-level ledger objects.
//!
//! The primitives here (hashes, keys, signatures, identifiers, amounts)
//! are shared by every other module; the submodules define the composite
//! objects built from them.

/// Block, proposal and verified-proposal objects.
pub mod block;
/// The command grammar and its permission sets.
pub mod command;
/// Consensus rounds, YAC hashes and vote messages.
pub mod consensus;
/// Client queries and responses.
pub mod query;
/// World-state records.
pub mod records;
/// User-visible transaction statuses.
pub mod status;
/// Transactions and transaction batches.
pub mod transaction;

pub use block::*;
pub use command::*;
pub use consensus::*;
pub use query::*;
pub use records::*;
pub use status::*;
pub use transaction::*;

use crate::error::IdentifierError;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Milliseconds since the UNIX epoch; the timestamp unit of the ledger.
pub type TimeMs = u64;

/// The current wall-clock time in ledger units.
pub fn current_time_ms() -> TimeMs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as TimeMs)
        .unwrap_or(0)
}

// -----------------------------------------------------------------------------
// Hash
// -----------------------------------------------------------------------------

/// A fixed 32-byte value produced by SHA3-256 over a canonical byte
/// serialization.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash: the `prev_hash` of the genesis block and the
    /// "voted for nothing" value in consensus.
    pub const EMPTY: Hash = Hash([0u8; 32]);

    /// Hashes raw bytes with SHA3-256.
    pub fn of(bytes: &[u8]) -> Hash {
        let digest = Sha3_256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    /// True for the all-zero hash.
    pub fn is_empty(&self) -> bool {
        *self == Hash::EMPTY
    }

    /// Hex representation of the hash bytes.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 hex-encoded bytes"))?;
        Ok(Hash(arr))
    }
}

// -----------------------------------------------------------------------------
// Keys and signatures
// -----------------------------------------------------------------------------

/// An Ed25519 public key; the peer identity and the signatory identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Default)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Hex representation of the key bytes.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 hex-encoded bytes"))?;
        Ok(PublicKey(arr))
    }
}

/// Raw Ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct SignatureBytes(pub [u8; 64]);

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", hex::encode(self.0))
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 hex-encoded bytes"))?;
        Ok(SignatureBytes(arr))
    }
}

/// A public key paired with the bytes it signed over a payload hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Signature {
    /// The signatory identity.
    pub public_key: PublicKey,
    /// The Ed25519 signature over the payload hash of the enclosing object.
    pub signature: SignatureBytes,
}

/// A set of signatures keyed by public key.
///
/// Insertion of a second signature under an already present key is a no-op;
/// the set therefore always satisfies
/// `|signatures| == |{sig.public_key}|`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Default)]
pub struct SignatureSet(BTreeMap<PublicKey, SignatureBytes>);

impl SignatureSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a signature. Returns `false` and leaves the set unchanged if
    /// a signature with the same public key is already present.
    pub fn insert(&mut self, signature: Signature) -> bool {
        use std::collections::btree_map::Entry;
        match self.0.entry(signature.public_key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(signature.signature);
                true
            }
        }
    }

    /// Adds every signature of `other` not already present; returns the
    /// number of signatures added.
    pub fn merge(&mut self, other: &SignatureSet) -> usize {
        other.iter().filter(|s| self.insert(*s)).count()
    }

    /// Number of signatures in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the set holds no signatures.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if a signature by `key` is present.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates the signatures in public-key order.
    pub fn iter(&self) -> impl Iterator<Item = Signature> + '_ {
        self.0.iter().map(|(public_key, signature)| Signature {
            public_key: *public_key,
            signature: *signature,
        })
    }

    /// Iterates the signatory public keys in order.
    pub fn public_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.keys()
    }
}

impl FromIterator<Signature> for SignatureSet {
    fn from_iter<I: IntoIterator<Item = Signature>>(iter: I) -> Self {
        let mut set = SignatureSet::new();
        for sig in iter {
            set.insert(sig);
        }
        set
    }
}

impl Serialize for SignatureSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for SignatureSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sigs = Vec::<Signature>::deserialize(deserializer)?;
        Ok(sigs.into_iter().collect())
    }
}

// -----------------------------------------------------------------------------
// Peer
// -----------------------------------------------------------------------------

/// A validating peer: a network address plus its identity key.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Peer {
    /// The peer's network address, `host:port`.
    pub address: String,
    /// The peer's identity key.
    pub public_key: PublicKey,
}

impl PartialOrd for Peer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Peer {
    // Lexicographic public-key order is the documented peer-ordering
    // tie-break.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.public_key, &self.address).cmp(&(&other.public_key, &other.address))
    }
}

// -----------------------------------------------------------------------------
// Amount
// -----------------------------------------------------------------------------

/// A fixed-point asset amount.
///
/// `value` counts minimal units; `precision` is the number of decimal
/// places and must match the precision of the asset it is applied to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Serialize, Deserialize,
)]
pub struct Amount {
    /// The amount in minimal units.
    pub value: u128,
    /// Number of decimal places.
    pub precision: u8,
}

impl Amount {
    /// Creates an amount.
    pub fn new(value: u128, precision: u8) -> Self {
        Self { value, precision }
    }

    /// Checked addition; `None` on overflow or precision mismatch.
    pub fn checked_add(&self, rhs: &Amount) -> Option<Amount> {
        if self.precision != rhs.precision {
            return None;
        }
        self.value.checked_add(rhs.value).map(|value| Amount {
            value,
            precision: self.precision,
        })
    }

    /// Checked subtraction; `None` on underflow or precision mismatch.
    pub fn checked_sub(&self, rhs: &Amount) -> Option<Amount> {
        if self.precision != rhs.precision {
            return None;
        }
        self.value.checked_sub(rhs.value).map(|value| Amount {
            value,
            precision: self.precision,
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precision == 0 {
            return write!(f, "{}", self.value);
        }
        let scale = 10u128.pow(self.precision as u32);
        write!(
            f,
            "{}.{:0width$}",
            self.value / scale,
            self.value % scale,
            width = self.precision as usize
        )
    }
}

// -----------------------------------------------------------------------------
// Identifiers
// -----------------------------------------------------------------------------

const MAX_NAME_LEN: usize = 32;

fn check_name(part: &str) -> Result<(), IdentifierError> {
    if part.is_empty() || part.len() > MAX_NAME_LEN {
        return Err(IdentifierError::InvalidLength(part.to_string()));
    }
    if !part
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err(IdentifierError::InvalidCharacters(part.to_string()));
    }
    Ok(())
}

fn split_id(value: &str, separator: char) -> Result<(&str, &str), IdentifierError> {
    value
        .split_once(separator)
        .ok_or_else(|| IdentifierError::MissingSeparator {
            separator,
            value: value.to_string(),
        })
}

/// A domain identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct DomainId(String);

impl DomainId {
    /// Parses and validates a domain name.
    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        check_name(name)?;
        Ok(Self(name.to_string()))
    }

    /// The domain name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DomainId {
    type Err = IdentifierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainId::new(s)
    }
}

/// A role name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct RoleName(String);

impl RoleName {
    /// Parses and validates a role name.
    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        check_name(name)?;
        Ok(Self(name.to_string()))
    }

    /// The role name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoleName {
    type Err = IdentifierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::new(s)
    }
}

/// An account identifier, written `name@domain`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct AccountId {
    /// The account name within its domain.
    pub name: String,
    /// The domain the account belongs to.
    pub domain: DomainId,
}

impl AccountId {
    /// Builds an account id from validated parts.
    pub fn new(name: &str, domain: DomainId) -> Result<Self, IdentifierError> {
        check_name(name)?;
        Ok(Self {
            name: name.to_string(),
            domain,
        })
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

impl FromStr for AccountId {
    type Err = IdentifierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, domain) = split_id(s, '@')?;
        AccountId::new(name, DomainId::new(domain)?)
    }
}

/// An asset identifier, written `name#domain`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct AssetId {
    /// The asset name within its domain.
    pub name: String,
    /// The domain the asset belongs to.
    pub domain: DomainId,
}

impl AssetId {
    /// Builds an asset id from validated parts.
    pub fn new(name: &str, domain: DomainId) -> Result<Self, IdentifierError> {
        check_name(name)?;
        Ok(Self {
            name: name.to_string(),
            domain,
        })
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.domain)
    }
}

impl FromStr for AssetId {
    type Err = IdentifierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, domain) = split_id(s, '#')?;
        AssetId::new(name, DomainId::new(domain)?)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(DomainId);
string_serde!(RoleName);
string_serde!(AccountId);
string_serde!(AssetId);
