// Path: crates/validation/src/stateful.rs
//! Stateful validation of proposals.
//!
//! Each proposal transaction passes three gates against the temporary
//! world-state view: signature quorum, per-command permission predicates,
//! and execution under a per-transaction savepoint. A failed transaction
//! is rolled back and recorded; the rest of the proposal continues
//! against the surrounding temporary state.

use crate::permissions;
use meridian_api::state::TemporaryWsv;
use meridian_types::app::{Proposal, Transaction, TransactionRejection, VerifiedProposal};
use meridian_types::error::ValidationError;
use tracing::{debug, info};

/// Signature-quorum and command validation of whole proposals.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatefulValidator;

impl StatefulValidator {
    /// Creates a validator.
    pub fn new() -> Self {
        Self
    }

    /// Validates `proposal` against `wsv`, returning the surviving subset
    /// and the ordered rejections. The caller owns the temporary view and
    /// its rollback.
    pub fn validate(
        &self,
        proposal: &Proposal,
        wsv: &mut dyn TemporaryWsv,
    ) -> VerifiedProposal {
        let mut verified = Vec::with_capacity(proposal.transactions.len());
        let mut rejected = Vec::new();

        for (index, tx) in proposal.transactions.iter().enumerate() {
            match self.validate_transaction(index, tx, wsv) {
                Ok(()) => verified.push(tx.clone()),
                Err(error) => {
                    debug!(tx = %tx.hash(), index, %error, "transaction rejected");
                    rejected.push(TransactionRejection {
                        tx_hash: tx.hash(),
                        tx_index: index as u32,
                        error,
                    });
                }
            }
        }

        info!(
            height = proposal.height,
            passed = verified.len(),
            rejected = rejected.len(),
            "stateful validation finished"
        );
        VerifiedProposal {
            proposal: Proposal {
                height: proposal.height,
                created_time: proposal.created_time,
                transactions: verified,
            },
            rejected,
        }
    }

    fn validate_transaction(
        &self,
        index: usize,
        tx: &Transaction,
        wsv: &mut dyn TemporaryWsv,
    ) -> Result<(), ValidationError> {
        self.validate_signatures(tx, wsv)?;

        let creator = &tx.payload.creator_account_id;
        for (command_index, command) in tx.payload.commands.iter().enumerate() {
            permissions::check_permission(wsv, creator, command).map_err(|error| {
                ValidationError::CommandFailed {
                    index: command_index as u32,
                    error,
                }
            })?;
        }

        let savepoint = format!("tx_{index}");
        wsv.savepoint(&savepoint)
            .map_err(|e| ValidationError::QuorumUnmet(e.to_string()))?;
        for (command_index, command) in tx.payload.commands.iter().enumerate() {
            if let Err(error) = wsv.execute(creator, command) {
                let _ = wsv.rollback_savepoint(&savepoint);
                return Err(ValidationError::CommandFailed {
                    index: command_index as u32,
                    error,
                });
            }
        }
        let _ = wsv.release_savepoint(&savepoint);
        Ok(())
    }

    /// Counts signatures of registered signatories over the payload hash;
    /// every provided key must be a signatory and the count must reach the
    /// creator's quorum.
    fn validate_signatures(
        &self,
        tx: &Transaction,
        wsv: &dyn TemporaryWsv,
    ) -> Result<(), ValidationError> {
        let creator = &tx.payload.creator_account_id;
        let account = wsv
            .account(creator)
            .ok()
            .flatten()
            .ok_or_else(|| ValidationError::QuorumUnmet(creator.to_string()))?;
        let signatories = wsv
            .signatories(creator)
            .ok()
            .flatten()
            .ok_or_else(|| ValidationError::QuorumUnmet(creator.to_string()))?;

        let payload_hash = tx.hash();
        for signature in tx.signatures.iter() {
            if !meridian_crypto::verify(&signature, &payload_hash.0) {
                return Err(ValidationError::BadSignature(signature.public_key));
            }
            if !signatories.contains(&signature.public_key) {
                return Err(ValidationError::NotSignatory(signature.public_key));
            }
        }

        let got = tx.signatures.len() as u32;
        if got < account.quorum {
            return Err(ValidationError::SignaturesInsufficient {
                got,
                quorum: account.quorum,
            });
        }
        Ok(())
    }
}
