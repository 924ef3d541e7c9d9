// Path: crates/node/tests/pipeline.rs
//! End-to-end pipeline scenarios over the in-process cluster harness.

use meridian_api::state::{BlockQuery, BlockStore};
use meridian_node::genesis;
use meridian_test_utils::fixtures::peer_of;
use meridian_test_utils::spawn_cluster;
use meridian_types::app::{Amount, Command, PublicKey, Query, QueryResponse, TxStatus};
use std::time::Duration;

const LONG: Duration = Duration::from_secs(30);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_peer_commits_a_submitted_transaction() {
    let cluster = spawn_cluster(1, false, vec![]).await;
    let node = &cluster.nodes[0];

    let tx = cluster.admin_tx(vec![Command::CreateAsset {
        asset_name: "token".to_string(),
        domain_id: "test".parse().unwrap(),
        precision: 0,
    }]);
    let hash = tx.hash();
    node.submit_transaction(tx.clone()).await;

    cluster
        .wait_for_status(node, hash, TxStatus::Committed, LONG)
        .await;

    // The transaction landed in a committed block past genesis.
    let storage = node.storage();
    let height = storage.top_height().unwrap();
    assert!(height >= 2);
    let mut found = false;
    for h in 2..=height {
        if let Some(block) = storage.block(h).unwrap() {
            found |= block.payload.transactions.iter().any(|t| t.hash() == hash);
        }
    }
    assert!(found, "committed block does not carry the transaction");

    // The query service finds the committed transaction by hash.
    match node.get_query_response(&Query::GetTransactions {
        tx_hashes: vec![hash],
    }) {
        QueryResponse::Transactions { transactions } => {
            assert_eq!(transactions.len(), 1);
            assert_eq!(transactions[0].hash(), hash);
        }
        other => panic!("unexpected query response: {other:?}"),
    }

    // The block stream replays the chain from genesis.
    let mut stream = node.get_block_stream();
    let first = stream.recv().await.unwrap();
    assert_eq!(first.block.height(), 1);
    let second = stream.recv().await.unwrap();
    assert_eq!(second.block.height(), 2);

    cluster.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_rounds_advance_without_growing_the_chain() {
    let cluster = spawn_cluster(1, false, vec![]).await;
    let node = &cluster.nodes[0];

    // Several proposal delays with no traffic.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(node.top_height(), 1);
    let round = node.current_round().await;
    assert_eq!(round.block_round, 2);
    assert!(round.reject_round > 1, "reject ordinal did not advance");

    cluster.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overwritten_ledger_accepts_a_fresh_resubmission() {
    let cluster = spawn_cluster(1, false, vec![]).await;
    let node = cluster.nodes[0].clone();

    let tx = cluster.admin_tx(vec![Command::CreateAsset {
        asset_name: "token".to_string(),
        domain_id: "test".parse().unwrap(),
        precision: 0,
    }]);
    node.submit_transaction(tx).await;
    cluster.wait_for_height(&node, 2, LONG).await;

    // Stop, drop the ledger, reinstall genesis: only one block remains.
    let storage = node.storage().clone();
    cluster.shutdown();
    storage.drop_ledger().unwrap();
    assert_eq!(storage.block_store().size().unwrap(), 0);
    genesis::install_genesis(&storage, &cluster.fixture.genesis).unwrap();
    assert_eq!(storage.block_store().size().unwrap(), 1);
    assert_eq!(storage.top_height().unwrap(), 1);

    // Relaunch over the overwritten ledger; a fresh submission commits.
    let scratch = tempfile::tempdir().unwrap();
    let config = meridian_test_utils::test_config(scratch.path(), 0, false);
    let (networks, loopback) = meridian_node::network::loopback_stack();
    let relaunched = meridian_node::Node::start(
        &config,
        cluster.fixture.node_pairs[0].clone(),
        storage,
        networks,
    )
    .await;
    let router = meridian_node::network::attach_loopback(relaunched.clone(), loopback);
    relaunched.kick_off().await;

    let fresh = cluster.admin_tx(vec![Command::CreateAsset {
        asset_name: "token".to_string(),
        domain_id: "test".parse().unwrap(),
        precision: 0,
    }]);
    let fresh_hash = fresh.hash();
    relaunched.submit_transaction(fresh).await;
    cluster
        .wait_for_status(&relaunched, fresh_hash, TxStatus::Committed, LONG)
        .await;
    assert!(relaunched.top_height() >= 2);

    relaunched.shutdown();
    router.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn multisig_transfer_completes_across_the_cluster() {
    // Account `shared@test` has quorum 2 with two signatories; each half
    // of the signature arrives at a different peer and meets via gossip.
    let k1 = meridian_crypto::KeyPair::generate();
    let k2 = meridian_crypto::KeyPair::generate();
    let extra = vec![
        Command::CreateAccount {
            account_name: "shared".to_string(),
            domain_id: "test".parse().unwrap(),
            public_key: k1.public_key(),
        },
        Command::AddSignatory {
            account_id: "shared@test".parse().unwrap(),
            public_key: k2.public_key(),
        },
        Command::SetQuorum {
            account_id: "shared@test".parse().unwrap(),
            quorum: 2,
        },
        Command::AddAssetQuantity {
            asset_id: "coin#test".parse().unwrap(),
            amount: Amount::new(500, 2),
        },
        Command::TransferAsset {
            src_account_id: "admin@test".parse().unwrap(),
            dest_account_id: "shared@test".parse().unwrap(),
            asset_id: "coin#test".parse().unwrap(),
            description: "funding".to_string(),
            amount: Amount::new(300, 2),
        },
    ];
    let cluster = spawn_cluster(4, true, extra).await;

    let transfer = vec![Command::TransferAsset {
        src_account_id: "shared@test".parse().unwrap(),
        dest_account_id: "admin@test".parse().unwrap(),
        asset_id: "coin#test".parse().unwrap(),
        description: "pay back".to_string(),
        amount: Amount::new(100, 2),
    }];

    // The same payload signed by each signatory separately.
    let base = meridian_types::app::Transaction::new(meridian_types::app::TransactionPayload {
        creator_account_id: "shared@test".parse().unwrap(),
        created_time: meridian_types::app::current_time_ms(),
        quorum: 2,
        commands: transfer,
    });
    let tx_hash = base.hash();
    let mut half_one = base.clone();
    half_one.add_signature(k1.sign_hash(&tx_hash));
    let mut half_two = base;
    half_two.add_signature(k2.sign_hash(&tx_hash));

    cluster.nodes[0].submit_transaction(half_one).await;
    cluster.nodes[1].submit_transaction(half_two).await;

    cluster
        .wait_for_status(&cluster.nodes[0], tx_hash, TxStatus::Committed, LONG)
        .await;

    // The committed transaction carries both signatures, exactly once.
    let storage = cluster.nodes[0].storage();
    let height = storage.top_height().unwrap();
    let mut occurrences = 0;
    for h in 2..=height {
        if let Some(block) = storage.block(h).unwrap() {
            for tx in &block.payload.transactions {
                if tx.hash() == tx_hash {
                    occurrences += 1;
                    assert_eq!(tx.signatures.len(), 2);
                    assert!(tx.signatures.contains(&k1.public_key()));
                    assert!(tx.signatures.contains(&k2.public_key()));
                }
            }
        }
    }
    assert_eq!(occurrences, 1, "multisig transfer committed {occurrences} times");

    cluster.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_peers_do_not_break_the_router() {
    let cluster = spawn_cluster(1, false, vec![]).await;
    // A send to a peer the router has never seen must surface as an
    // error, not a panic.
    let endpoint = cluster
        .network
        .endpoint(peer_of(&cluster.fixture.node_pairs[0], 0));
    let stranger = meridian_types::app::Peer {
        address: "127.0.0.1:1".to_string(),
        public_key: PublicKey([0xAB; 32]),
    };
    let result = meridian_api::network::YacNetwork::send_state(&*endpoint, &stranger, vec![]).await;
    assert!(result.is_err());
    cluster.shutdown();
}
