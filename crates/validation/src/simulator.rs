// Path: crates/validation/src/simulator.rs
//! Candidate-block production from verified proposals.
//!
//! For each round proposal the simulator stateful-validates against a
//! fresh temporary world-state view, builds a signed candidate block from
//! the surviving transactions and hands it to consensus. The temporary
//! view is dropped — rolled back — in every case.

use crate::stateful::StatefulValidator;
use meridian_api::consensus::CandidateBlock;
use meridian_api::ordering::RoundProposal;
use meridian_api::state::{BlockQuery, TemporaryFactory};
use meridian_crypto::KeyPair;
use meridian_types::app::{Block, BlockPayload};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Builds signed candidate blocks out of round proposals.
pub struct Simulator {
    validator: StatefulValidator,
    temporary_factory: Arc<dyn TemporaryFactory>,
    block_query: Arc<dyn BlockQuery>,
    key_pair: KeyPair,
}

impl Simulator {
    /// Creates a simulator over the given world-state factory and block
    /// query, signing candidates with `key_pair`.
    pub fn new(
        temporary_factory: Arc<dyn TemporaryFactory>,
        block_query: Arc<dyn BlockQuery>,
        key_pair: KeyPair,
    ) -> Self {
        Self {
            validator: StatefulValidator::new(),
            temporary_factory,
            block_query,
            key_pair,
        }
    }

    /// Validates one round proposal and produces the signed candidate
    /// block, or `None` when the proposal does not extend the local top
    /// block or the world state cannot be opened.
    pub fn process_proposal(&self, input: &RoundProposal) -> Option<CandidateBlock> {
        let top = match self.block_query.top_block() {
            Ok(Some(top)) => top,
            Ok(None) => {
                warn!("no top block; ledger not initialized");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "could not fetch top block");
                return None;
            }
        };

        if top.height() + 1 != input.proposal.height {
            warn!(
                top_height = top.height(),
                proposal_height = input.proposal.height,
                "proposal does not extend the local top block"
            );
            return None;
        }

        let mut wsv = match self.temporary_factory.create_temporary_wsv() {
            Ok(wsv) => wsv,
            Err(e) => {
                error!(error = %e, "could not open temporary world-state view");
                return None;
            }
        };

        let verified = self.validator.validate(&input.proposal, wsv.as_mut());
        drop(wsv); // rollback

        let mut block = Block::new(BlockPayload {
            height: input.proposal.height,
            prev_hash: top.hash(),
            created_time: input.proposal.created_time,
            transactions: verified.proposal.transactions.clone(),
            rejected_transactions_hashes: verified
                .rejected
                .iter()
                .map(|r| r.tx_hash)
                .collect(),
        });
        let block_hash = block.hash();
        block.add_signature(self.key_pair.sign_hash(&block_hash));

        info!(
            round = %input.round,
            block = %block_hash,
            transactions = block.payload.transactions.len(),
            "candidate block built"
        );
        Some(CandidateBlock {
            round: input.round,
            proposal_hash: input.proposal.hash(),
            block,
            rejected: verified.rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_api::state::{MutableFactory, MutableStorage};
    use meridian_storage::Storage;
    use meridian_types::app::{
        Amount, Command, Hash, Proposal, RolePermissions, Round, Transaction, TransactionPayload,
    };
    use meridian_types::error::{command_error_code, ValidationError};

    struct Fixture {
        _dir: tempfile::TempDir,
        storage: Arc<Storage>,
        admin_pair: KeyPair,
        bob_pair: KeyPair,
        genesis_hash: Hash,
    }

    fn signed_tx(creator: &str, pair: &KeyPair, commands: Vec<Command>) -> Transaction {
        let mut tx = Transaction::new(TransactionPayload {
            creator_account_id: creator.parse().unwrap(),
            created_time: 10,
            quorum: 1,
            commands,
        });
        let hash = tx.hash();
        tx.add_signature(pair.sign_hash(&hash));
        tx
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            Storage::open(&dir.path().join("wsv.redb"), &dir.path().join("blocks")).unwrap(),
        );
        let admin_pair = KeyPair::generate();
        let bob_pair = KeyPair::generate();

        let commands = vec![
            Command::CreateRole {
                role_name: "admin".parse().unwrap(),
                permissions: RolePermissions::all(),
            },
            Command::CreateRole {
                role_name: "user".parse().unwrap(),
                permissions: RolePermissions::RECEIVE,
            },
            Command::CreateDomain {
                domain_id: "dom".parse().unwrap(),
                default_role: "user".parse().unwrap(),
            },
            Command::CreateAccount {
                account_name: "admin".to_string(),
                domain_id: "dom".parse().unwrap(),
                public_key: admin_pair.public_key(),
            },
            Command::AppendRole {
                account_id: "admin@dom".parse().unwrap(),
                role_name: "admin".parse().unwrap(),
            },
            Command::CreateAccount {
                account_name: "bob".to_string(),
                domain_id: "dom".parse().unwrap(),
                public_key: bob_pair.public_key(),
            },
            Command::CreateAsset {
                asset_name: "coin".to_string(),
                domain_id: "dom".parse().unwrap(),
                precision: 2,
            },
            Command::AddAssetQuantity {
                asset_id: "coin#dom".parse().unwrap(),
                amount: Amount::new(1000, 2),
            },
        ];
        let genesis = Block::new(BlockPayload {
            height: 1,
            prev_hash: Hash::EMPTY,
            created_time: 0,
            transactions: vec![Transaction::new(TransactionPayload {
                creator_account_id: "admin@dom".parse().unwrap(),
                created_time: 0,
                quorum: 1,
                commands,
            })],
            rejected_transactions_hashes: vec![],
        });
        let genesis_hash = genesis.hash();

        let mut mutable = storage.create_mutable_storage().unwrap();
        mutable.apply(&genesis).unwrap();
        mutable.commit().unwrap();

        Fixture {
            _dir: dir,
            storage,
            admin_pair,
            bob_pair,
            genesis_hash,
        }
    }

    fn simulator(f: &Fixture) -> Simulator {
        Simulator::new(
            f.storage.clone(),
            f.storage.clone(),
            f.admin_pair.clone(),
        )
    }

    #[test]
    fn rejected_transaction_does_not_stop_the_block() {
        let f = fixture();

        let tx_valid = signed_tx(
            "admin@dom",
            &f.admin_pair,
            vec![Command::TransferAsset {
                src_account_id: "admin@dom".parse().unwrap(),
                dest_account_id: "bob@dom".parse().unwrap(),
                asset_id: "coin#dom".parse().unwrap(),
                description: "pay".to_string(),
                amount: Amount::new(100, 2),
            }],
        );
        // Bob has no transfer permission.
        let tx_denied = signed_tx(
            "bob@dom",
            &f.bob_pair,
            vec![Command::TransferAsset {
                src_account_id: "bob@dom".parse().unwrap(),
                dest_account_id: "admin@dom".parse().unwrap(),
                asset_id: "coin#dom".parse().unwrap(),
                description: "back".to_string(),
                amount: Amount::new(1, 2),
            }],
        );
        let denied_hash = tx_denied.hash();

        let candidate = simulator(&f)
            .process_proposal(&RoundProposal {
                round: Round::initial(),
                proposal: Proposal {
                    height: 2,
                    created_time: 20,
                    transactions: vec![tx_valid.clone(), tx_denied],
                },
            })
            .unwrap();

        assert_eq!(candidate.block.payload.transactions, vec![tx_valid]);
        assert_eq!(
            candidate.block.payload.rejected_transactions_hashes,
            vec![denied_hash]
        );
        assert_eq!(candidate.block.payload.prev_hash, f.genesis_hash);
        assert_eq!(candidate.rejected.len(), 1);
        match &candidate.rejected[0].error {
            ValidationError::CommandFailed { error, .. } => {
                assert_eq!(error.error_code, command_error_code::PERMISSION_DENIED);
            }
            other => panic!("unexpected rejection: {other:?}"),
        }

        // The candidate is signed by the node key.
        assert!(candidate
            .block
            .signatures
            .contains(&f.admin_pair.public_key()));
    }

    #[test]
    fn unsigned_transaction_is_rejected_for_quorum() {
        let f = fixture();
        let mut tx = signed_tx(
            "admin@dom",
            &f.admin_pair,
            vec![Command::AddAssetQuantity {
                asset_id: "coin#dom".parse().unwrap(),
                amount: Amount::new(1, 2),
            }],
        );
        // Replace the valid signature with one from a stranger key.
        tx.signatures = [KeyPair::generate().sign_hash(&tx.hash())]
            .into_iter()
            .collect();

        let candidate = simulator(&f)
            .process_proposal(&RoundProposal {
                round: Round::initial(),
                proposal: Proposal {
                    height: 2,
                    created_time: 20,
                    transactions: vec![tx],
                },
            })
            .unwrap();

        assert!(candidate.block.payload.transactions.is_empty());
        assert_eq!(candidate.rejected.len(), 1);
        assert!(matches!(
            candidate.rejected[0].error,
            ValidationError::NotSignatory(_)
        ));
    }

    #[test]
    fn stale_proposal_height_is_skipped() {
        let f = fixture();
        let candidate = simulator(&f).process_proposal(&RoundProposal {
            round: Round::new(5, 1),
            proposal: Proposal::empty(5, 50),
        });
        assert!(candidate.is_none());
    }

    #[test]
    fn empty_proposal_yields_empty_block() {
        let f = fixture();
        let candidate = simulator(&f)
            .process_proposal(&RoundProposal {
                round: Round::initial(),
                proposal: Proposal::empty(2, 30),
            })
            .unwrap();
        assert!(candidate.block.payload.transactions.is_empty());
        assert!(candidate.block.payload.rejected_transactions_hashes.is_empty());
        assert_eq!(candidate.block.height(), 2);
    }
}
