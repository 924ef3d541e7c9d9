// Path: crates/crypto/src/key_store.rs
//! Keypair file I/O.
//!
//! A keypair named `<basename>` lives in two files next to each other:
//! `<basename>.pub` holding the hex-encoded public key and
//! `<basename>.priv` holding the hex-encoded 64-byte private key.

use crate::error::CryptoError;
use crate::signer::{KeyPair, PRIVATE_KEY_LEN};
use std::path::Path;
use zeroize::Zeroize;

fn key_file_error(path: &Path, message: impl ToString) -> CryptoError {
    CryptoError::KeyFile {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Loads a keypair from `<basename>.pub` / `<basename>.priv` and checks
/// that the two halves belong together.
pub fn load_keypair(basename: &Path) -> Result<KeyPair, CryptoError> {
    let priv_path = basename.with_extension("priv");
    let pub_path = basename.with_extension("pub");

    let mut priv_hex = std::fs::read_to_string(&priv_path)
        .map_err(|e| key_file_error(&priv_path, e))?;
    let mut priv_bytes = hex::decode(priv_hex.trim())
        .map_err(|e| key_file_error(&priv_path, e))?;
    priv_hex.zeroize();

    if priv_bytes.len() != PRIVATE_KEY_LEN {
        let got = priv_bytes.len();
        priv_bytes.zeroize();
        return Err(CryptoError::InvalidKey {
            expected: PRIVATE_KEY_LEN,
            got,
        });
    }
    let pair = KeyPair::from_private_key_bytes(&priv_bytes);
    priv_bytes.zeroize();
    let pair = pair?;

    let pub_hex = std::fs::read_to_string(&pub_path)
        .map_err(|e| key_file_error(&pub_path, e))?;
    let pub_bytes = hex::decode(pub_hex.trim())
        .map_err(|e| key_file_error(&pub_path, e))?;
    if pub_bytes != pair.public_key().0 {
        return Err(CryptoError::KeyMismatch);
    }

    Ok(pair)
}

/// Writes a keypair to `<basename>.pub` / `<basename>.priv`.
pub fn save_keypair(basename: &Path, pair: &KeyPair) -> Result<(), CryptoError> {
    let priv_path = basename.with_extension("priv");
    let pub_path = basename.with_extension("pub");

    let mut priv_hex = hex::encode(pair.private_key_bytes());
    let write_result = std::fs::write(&priv_path, &priv_hex);
    priv_hex.zeroize();
    write_result.map_err(|e| key_file_error(&priv_path, e))?;

    std::fs::write(&pub_path, pair.public_key().hex())
        .map_err(|e| key_file_error(&pub_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let basename = dir.path().join("node0");

        let pair = KeyPair::generate();
        save_keypair(&basename, &pair).unwrap();
        let loaded = load_keypair(&basename).unwrap();
        assert_eq!(pair.public_key(), loaded.public_key());
    }

    #[test]
    fn mismatched_public_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let basename = dir.path().join("node0");

        save_keypair(&basename, &KeyPair::generate()).unwrap();
        // Overwrite the public half with another keypair's key.
        std::fs::write(
            basename.with_extension("pub"),
            KeyPair::generate().public_key().hex(),
        )
        .unwrap();

        assert!(matches!(
            load_keypair(&basename),
            Err(CryptoError::KeyMismatch)
        ));
    }

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_keypair(&dir.path().join("absent")),
            Err(CryptoError::KeyFile { .. })
        ));
    }
}
