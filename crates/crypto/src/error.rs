// Path: crates/crypto/src/error.rs
//! Error types for cryptographic operations.

use meridian_types::error::ErrorCode;
use thiserror::Error;

/// Failures of cryptographic operations. These never surface above the
/// direct caller: callers either propagate a typed rejection of their own
/// or treat the operation as a boolean failure.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key or signature material has the wrong size or shape.
    #[error("Invalid key material: expected {expected} bytes, got {got}")]
    InvalidKey {
        /// The required byte length.
        expected: usize,
        /// The length actually supplied.
        got: usize,
    },
    /// A signature failed verification.
    #[error("Signature verification failed")]
    VerifyFailed,
    /// A keypair file could not be read or written.
    #[error("Keypair file error at {path}: {message}")]
    KeyFile {
        /// The offending path.
        path: String,
        /// Description of the failure.
        message: String,
    },
    /// The public key file does not match the private key.
    #[error("Public key file does not match the private key")]
    KeyMismatch,
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey { .. } => "CRYPTO_INVALID_KEY",
            Self::VerifyFailed => "CRYPTO_VERIFY_FAILED",
            Self::KeyFile { .. } => "CRYPTO_KEY_FILE",
            Self::KeyMismatch => "CRYPTO_KEY_MISMATCH",
        }
    }
}
