// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic binary codec for all
//! consensus-critical objects.
//!
//! This module provides thin wrappers around `parity-scale-codec` (SCALE),
//! chosen for its compact and deterministic properties. Centralizing the
//! codec here in the base `types` crate guarantees that every component
//! hashes and transports the exact same byte representation of the same
//! object; a divergence here is a consensus failure.

use crate::error::WireError;
use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical byte representation.
///
/// Use this for every object that is hashed, signed, persisted, or put on
/// the wire. SCALE encoding of a value is total, so this cannot fail.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on malformed input and, via `decode_all`, on trailing bytes,
/// so a message whose declared size does not match its parsed size is
/// rejected rather than silently truncated.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, WireError> {
    T::decode_all(&mut &*b).map_err(|e| WireError::Malformed(e.to_string()))
}

/// Encodes a value with a 4-byte big-endian length prefix.
///
/// This is the framing used for block files and for every inter-peer
/// message payload.
pub fn to_bytes_framed<T: Encode>(v: &T) -> Vec<u8> {
    let payload = v.encode();
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Decodes a length-prefixed value, verifying the declared length against
/// the actual payload size.
pub fn from_bytes_framed<T: Decode>(b: &[u8]) -> Result<T, WireError> {
    if b.len() < 4 {
        return Err(WireError::Malformed("frame shorter than length prefix".into()));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&b[..4]);
    let declared = u32::from_be_bytes(len_bytes) as usize;
    let payload = &b[4..];
    if declared != payload.len() {
        return Err(WireError::SizeMismatch {
            declared,
            parsed: payload.len(),
        });
    }
    from_bytes_canonical(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Encode, Decode, Debug, PartialEq, Eq)]
    struct Sample {
        id: u32,
        name: String,
        tags: Vec<u8>,
    }

    #[test]
    fn canonical_roundtrip() {
        let original = Sample {
            id: 42,
            name: "ledger-object".to_string(),
            tags: vec![1, 2, 3],
        };

        let encoded = to_bytes_canonical(&original);
        assert!(!encoded.is_empty());
        let decoded = from_bytes_canonical::<Sample>(&encoded).unwrap();
        assert_eq!(original, decoded);

        let mut set = BTreeSet::new();
        set.insert([1u8; 32]);
        set.insert([2u8; 32]);
        let encoded_set = to_bytes_canonical(&set);
        let decoded_set = from_bytes_canonical::<BTreeSet<[u8; 32]>>(&encoded_set).unwrap();
        assert_eq!(set, decoded_set);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let original = Sample {
            id: 99,
            name: "x".to_string(),
            tags: vec![10, 20, 30],
        };
        let mut encoded = to_bytes_canonical(&original);
        encoded.pop();
        assert!(from_bytes_canonical::<Sample>(&encoded).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = to_bytes_canonical(&7u32);
        encoded.push(0xFF);
        assert!(from_bytes_canonical::<u32>(&encoded).is_err());
    }

    #[test]
    fn framed_roundtrip_and_size_check() {
        let original = Sample {
            id: 7,
            name: "framed".to_string(),
            tags: vec![],
        };
        let framed = to_bytes_framed(&original);
        assert_eq!(from_bytes_framed::<Sample>(&framed).unwrap(), original);

        // Corrupt the declared length.
        let mut bad = framed.clone();
        bad[3] = bad[3].wrapping_add(1);
        match from_bytes_framed::<Sample>(&bad) {
            Err(WireError::SizeMismatch { .. }) => {}
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }
}
