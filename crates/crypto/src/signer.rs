// Path: crates/crypto/src/signer.rs
//! Ed25519 keypair, signing and verification.

use crate::error::CryptoError;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use meridian_types::app::{Hash, PublicKey, Signature, SignatureBytes};
use rand::rngs::OsRng;

/// Length of a serialized private key: secret seed followed by the public
/// key, as produced by [`KeyPair::private_key_bytes`].
pub const PRIVATE_KEY_LEN: usize = 64;
/// Length of a serialized public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Length of a signature.
pub const SIGNATURE_LEN: usize = 64;

/// An Ed25519 keypair. The public key doubles as the peer identity and
/// the signatory identity.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generates a fresh keypair from the OS entropy source.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restores a keypair from its 64-byte serialized form.
    pub fn from_private_key_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: &[u8; PRIVATE_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKey {
                    expected: PRIVATE_KEY_LEN,
                    got: bytes.len(),
                })?;
        let signing =
            SigningKey::from_keypair_bytes(arr).map_err(|_| CryptoError::InvalidKey {
                expected: PRIVATE_KEY_LEN,
                got: bytes.len(),
            })?;
        Ok(Self { signing })
    }

    /// The public half of the keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// The 64-byte serialized private key (secret seed ‖ public key).
    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.signing.to_keypair_bytes()
    }

    /// Signs arbitrary payload bytes.
    pub fn sign(&self, payload: &[u8]) -> Signature {
        let sig = self.signing.sign(payload);
        Signature {
            public_key: self.public_key(),
            signature: SignatureBytes(sig.to_bytes()),
        }
    }

    /// Signs a payload hash, the usual case for ledger objects.
    pub fn sign_hash(&self, hash: &Hash) -> Signature {
        self.sign(&hash.0)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the private half.
        write!(f, "KeyPair({})", self.public_key())
    }
}

/// Verifies a signature against payload bytes. Total: malformed key
/// material yields `false`.
pub fn verify(signature: &Signature, payload: &[u8]) -> bool {
    verify_parts(&signature.signature, payload, &signature.public_key)
}

/// Verifies raw signature parts against payload bytes. Total: malformed
/// key material yields `false`.
pub fn verify_parts(signature: &SignatureBytes, payload: &[u8], public_key: &PublicKey) -> bool {
    let Ok(verifying) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying.verify_strict(payload, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let pair = KeyPair::generate();
        let payload = b"round payload";
        let sig = pair.sign(payload);
        assert!(verify(&sig, payload));
        assert!(!verify(&sig, b"other payload"));
    }

    #[test]
    fn keypair_bytes_roundtrip() {
        let pair = KeyPair::generate();
        let restored = KeyPair::from_private_key_bytes(&pair.private_key_bytes()).unwrap();
        assert_eq!(pair.public_key(), restored.public_key());

        let sig = restored.sign(b"payload");
        assert!(verify(&sig, b"payload"));
    }

    #[test]
    fn short_private_key_is_invalid() {
        match KeyPair::from_private_key_bytes(&[0u8; 32]) {
            Err(CryptoError::InvalidKey { expected: 64, got: 32 }) => {}
            other => panic!("expected InvalidKey, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn verification_is_total_on_garbage_keys() {
        // Not a valid curve point; must return false, not panic.
        let bogus = PublicKey([0xFF; 32]);
        assert!(!verify_parts(&SignatureBytes([0u8; 64]), b"x", &bogus));
    }

    #[test]
    fn tampered_signature_fails() {
        let pair = KeyPair::generate();
        let mut sig = pair.sign(b"payload");
        sig.signature.0[0] ^= 0x01;
        assert!(!verify(&sig, b"payload"));
    }
}
