// Path: crates/types/src/error/mod.rs
//! Core error types for the Meridian ledger node.

use crate::app::{Hash, PublicKey, Round};
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors produced while parsing or framing wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The message bytes could not be decoded into the expected object.
    #[error("Malformed message: {0}")]
    Malformed(String),
    /// The message carried an unknown discriminant.
    #[error("Unknown message kind: {0}")]
    UnknownKind(u8),
    /// The declared size of a framed message does not match its parsed size.
    #[error("Declared size {declared} does not match parsed size {parsed}")]
    SizeMismatch {
        /// The size claimed by the length prefix.
        declared: usize,
        /// The size actually present.
        parsed: usize,
    },
}

impl ErrorCode for WireError {
    fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "WIRE_MALFORMED",
            Self::UnknownKind(_) => "WIRE_UNKNOWN_KIND",
            Self::SizeMismatch { .. } => "WIRE_SIZE_MISMATCH",
        }
    }
}

/// Errors produced while parsing ledger identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The identifier is empty or exceeds the allowed length.
    #[error("Identifier has invalid length: {0}")]
    InvalidLength(String),
    /// The identifier contains a character outside `[a-z0-9_]`.
    #[error("Identifier contains invalid characters: {0}")]
    InvalidCharacters(String),
    /// The identifier is missing its separator (`@` or `#`).
    #[error("Identifier is missing separator {separator:?}: {value}")]
    MissingSeparator {
        /// The expected separator character.
        separator: char,
        /// The offending input.
        value: String,
    },
}

impl ErrorCode for IdentifierError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidLength(_) => "ID_INVALID_LENGTH",
            Self::InvalidCharacters(_) => "ID_INVALID_CHARACTERS",
            Self::MissingSeparator { .. } => "ID_MISSING_SEPARATOR",
        }
    }
}

/// A typed failure of a single command during stateful validation.
///
/// `error_code` values are per-command reason codes; see the command
/// executor for the assignment. The pair is stored with the verified
/// proposal and surfaced through the transaction status stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Command {command_name} failed with code {error_code}")]
pub struct CommandError {
    /// Name of the failed command kind.
    pub command_name: &'static str,
    /// Per-command reason code.
    pub error_code: u32,
}

/// Reason codes shared by the command executor.
pub mod command_error_code {
    /// The storage backend failed while executing the command.
    pub const INTERNAL: u32 = 0;
    /// The creator lacks the permission required by the command.
    pub const PERMISSION_DENIED: u32 = 1;
    /// An object the command refers to does not exist.
    pub const NO_SUCH_OBJECT: u32 = 2;
    /// An amount has the wrong precision or does not fit.
    pub const INVALID_AMOUNT: u32 = 3;
    /// The account balance is insufficient.
    pub const INSUFFICIENT_BALANCE: u32 = 4;
    /// The object the command would create already exists.
    pub const ALREADY_EXISTS: u32 = 5;
    /// The command would violate the account quorum constraint.
    pub const QUORUM_CONSTRAINT: u32 = 6;
    /// A name carried by the command is not a valid identifier.
    pub const INVALID_NAME: u32 = 7;
}

/// Per-transaction failures raised by the stateful validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Fewer valid signatures than the creator's quorum.
    #[error("Insufficient signatures: got {got}, quorum is {quorum}")]
    SignaturesInsufficient {
        /// Signatures present on the transaction.
        got: u32,
        /// The creator account quorum.
        quorum: u32,
    },
    /// A signature's public key is not a registered signatory of the creator.
    #[error("Public key {0} is not a signatory of the creator account")]
    NotSignatory(PublicKey),
    /// The creator account is unknown, so no quorum can be established.
    #[error("Quorum cannot be established for unknown account {0}")]
    QuorumUnmet(String),
    /// A signature failed cryptographic verification.
    #[error("Signature of {0} failed verification")]
    BadSignature(PublicKey),
    /// A command of the transaction was rejected.
    #[error("Command {index} rejected: {error}")]
    CommandFailed {
        /// Index of the failed command within the transaction.
        index: u32,
        /// The typed command failure.
        error: CommandError,
    },
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::SignaturesInsufficient { .. } => "VALIDATION_SIGNATURES_INSUFFICIENT",
            Self::NotSignatory(_) => "VALIDATION_NOT_SIGNATORY",
            Self::QuorumUnmet(_) => "VALIDATION_QUORUM_UNMET",
            Self::BadSignature(_) => "VALIDATION_BAD_SIGNATURE",
            Self::CommandFailed { .. } => "VALIDATION_COMMAND_FAILED",
        }
    }
}

/// Errors related to the consensus component.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// A vote carried an invalid signature and was dropped.
    #[error("Crypto verification failed for inbound vote state")]
    CryptoFailed,
    /// A vote arrived for a round that has already been resolved.
    #[error("Vote for already resolved round {0}")]
    OutOfRound(Round),
    /// The committed hash differs from the hash this node voted for.
    #[error("Commit hash {committed} diverges from voted hash {voted}")]
    Divergence {
        /// The hash the cluster committed.
        committed: Hash,
        /// The hash this node voted for.
        voted: Hash,
    },
}

impl ErrorCode for ConsensusError {
    fn code(&self) -> &'static str {
        match self {
            Self::CryptoFailed => "CONSENSUS_CRYPTO_FAILED",
            Self::OutOfRound(_) => "CONSENSUS_OUT_OF_ROUND",
            Self::Divergence { .. } => "CONSENSUS_DIVERGENCE",
        }
    }
}

/// Errors related to the world-state and block storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Opening a storage transaction failed; the current outcome is aborted.
    #[error("Failed to begin storage transaction: {0}")]
    TransactionBegin(String),
    /// Applying a block or command batch to storage failed.
    #[error("Failed to apply to storage: {0}")]
    ApplyFailed(String),
    /// Committing a storage transaction failed.
    #[error("Failed to commit storage transaction: {0}")]
    CommitFailed(String),
    /// An error in the storage backend itself.
    #[error("Storage backend error: {0}")]
    Backend(String),
    /// A stored value failed to decode.
    #[error("Failed to decode stored value: {0}")]
    Decode(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::TransactionBegin(_) => "STORAGE_TRANSACTION_BEGIN",
            Self::ApplyFailed(_) => "STORAGE_APPLY_FAILED",
            Self::CommitFailed(_) => "STORAGE_COMMIT_FAILED",
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::Decode(_) => "STORAGE_DECODE_ERROR",
        }
    }
}

/// Errors related to peer-to-peer block retrieval.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The peer does not have the requested block.
    #[error("Peer has no block {0}")]
    NoSuchBlock(Hash),
    /// The returned block's payload hash does not match the request.
    #[error("Block hash mismatch: requested {requested}, got {got}")]
    HashMismatch {
        /// The hash that was requested.
        requested: Hash,
        /// The payload hash of the block actually returned.
        got: Hash,
    },
    /// The peer could not be reached.
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),
}

impl ErrorCode for LoaderError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBlock(_) => "LOADER_NO_SUCH_BLOCK",
            Self::HashMismatch { .. } => "LOADER_HASH_MISMATCH",
            Self::PeerUnreachable(_) => "LOADER_PEER_UNREACHABLE",
        }
    }
}

/// Errors raised while loading the node configuration or genesis files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file contents failed to parse.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// A description of the parse failure.
        message: String,
    },
    /// A configuration value is out of its allowed range.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The configuration key.
        key: &'static str,
        /// Why the value is rejected.
        message: String,
    },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "CONFIG_IO",
            Self::Parse { .. } => "CONFIG_PARSE",
            Self::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
        }
    }
}
