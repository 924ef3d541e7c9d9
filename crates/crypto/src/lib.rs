// Path: crates/crypto/src/lib.rs
//! Ed25519 signing/verification and keypair handling for the Meridian
//! ledger node.
//!
//! Payload hashing (SHA3-256 over the canonical encoding) lives with the
//! object definitions in `meridian-types`; this crate owns everything that
//! touches key material: generation, file I/O, signing and verification.
//! Verification is total: malformed input yields `false`, never a panic.

/// Crypto error types.
pub mod error;
/// Keypair file I/O (`<basename>.pub` / `<basename>.priv`).
pub mod key_store;
/// Keypair type, signing and verification.
pub mod signer;

pub use error::CryptoError;
pub use key_store::{load_keypair, save_keypair};
pub use signer::{verify, verify_parts, KeyPair};
