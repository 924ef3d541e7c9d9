// Path: crates/validation/src/chain.rs
//! Chain validation for downloaded block chains.
//!
//! A downloaded chain is applied block by block onto one mutable storage.
//! Each block must link to the staged top by `prev_hash` and carry a
//! validator supermajority — judged against the validator set as staged
//! *before* that block is applied.

use meridian_api::state::MutableStorage;
use meridian_types::app::{has_supermajority, Block};
use tracing::{info, warn};

/// Validates and applies block chains during synchronization.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChainValidator;

impl ChainValidator {
    /// Creates a validator.
    pub fn new() -> Self {
        Self
    }

    /// Applies `blocks` in order onto `storage`. Returns `false` (leaving
    /// the storage half-staged, to be dropped by the caller) as soon as
    /// one block fails validation or application.
    pub fn validate_and_apply(
        &self,
        blocks: &[Block],
        storage: &mut dyn MutableStorage,
    ) -> bool {
        for block in blocks {
            if !self.validate_block(block, storage) {
                return false;
            }
            if let Err(e) = storage.apply(block) {
                warn!(height = block.height(), error = %e, "failed to apply downloaded block");
                return false;
            }
        }
        true
    }

    fn validate_block(&self, block: &Block, storage: &dyn MutableStorage) -> bool {
        info!(height = block.height(), hash = %block.hash(), "validating block");

        if block.payload.prev_hash != storage.top_hash() {
            warn!(
                height = block.height(),
                expected = %storage.top_hash(),
                got = %block.payload.prev_hash,
                "broken prev-hash linkage"
            );
            return false;
        }

        let peers = match storage.peers() {
            Ok(peers) => peers,
            Err(e) => {
                warn!(error = %e, "failed to read validator set");
                return false;
            }
        };

        // Every signature must belong to a known validator and verify
        // over the payload hash.
        let payload_hash = block.hash();
        for signature in block.signatures.iter() {
            if !peers.iter().any(|p| p.public_key == signature.public_key) {
                warn!(signer = %signature.public_key, "block signer is not a validator");
                return false;
            }
            if !meridian_crypto::verify(&signature, &payload_hash.0) {
                warn!(signer = %signature.public_key, "invalid block signature");
                return false;
            }
        }

        if !has_supermajority(block.signatures.len(), peers.len()) {
            warn!(
                height = block.height(),
                signatures = block.signatures.len(),
                peers = peers.len(),
                "block lacks supermajority"
            );
            return false;
        }
        true
    }
}
