// Path: crates/test-utils/src/fixtures.rs
//! Genesis and cluster fixtures.

use crate::router::InProcessNetwork;
use meridian_crypto::KeyPair;
use meridian_node::{genesis, NetworkStack, Node};
use meridian_storage::Storage;
use meridian_types::app::{
    Block, BlockPayload, Command, Hash, Peer, RolePermissions, Transaction, TransactionPayload,
    TxStatus,
};
use meridian_types::config::NodeConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Keys and genesis material of a test cluster.
pub struct ClusterFixture {
    /// One keypair per validating node.
    pub node_pairs: Vec<KeyPair>,
    /// The administration account keypair (`admin@test`).
    pub admin_pair: KeyPair,
    /// The genesis block installing roles, accounts and the validator
    /// set.
    pub genesis: Block,
}

/// The peer record of node `index`.
pub fn peer_of(pair: &KeyPair, index: usize) -> Peer {
    Peer {
        address: format!("127.0.0.1:{}", 10_001 + index),
        public_key: pair.public_key(),
    }
}

/// Builds a genesis block: an `admin` role with every permission, the
/// `test` domain, the `admin@test` account, the validator set, plus any
/// extra commands; signed by the first node key.
pub fn build_genesis(
    node_pairs: &[KeyPair],
    admin_pair: &KeyPair,
    extra_commands: Vec<Command>,
) -> Block {
    let mut commands = vec![
        Command::CreateRole {
            role_name: "admin".parse().expect("role name"),
            permissions: RolePermissions::all(),
        },
        Command::CreateDomain {
            domain_id: "test".parse().expect("domain"),
            default_role: "admin".parse().expect("role name"),
        },
        Command::CreateAccount {
            account_name: "admin".to_string(),
            domain_id: "test".parse().expect("domain"),
            public_key: admin_pair.public_key(),
        },
        Command::CreateAsset {
            asset_name: "coin".to_string(),
            domain_id: "test".parse().expect("domain"),
            precision: 2,
        },
    ];
    for (index, pair) in node_pairs.iter().enumerate() {
        commands.push(Command::AddPeer {
            peer: peer_of(pair, index),
        });
    }
    commands.extend(extra_commands);

    let mut block = Block::new(BlockPayload {
        height: 1,
        prev_hash: Hash::EMPTY,
        created_time: 0,
        transactions: vec![Transaction::new(TransactionPayload {
            creator_account_id: "admin@test".parse().expect("account id"),
            created_time: 0,
            quorum: 1,
            commands,
        })],
        rejected_transactions_hashes: vec![],
    });
    let hash = block.hash();
    if let Some(bootstrap) = node_pairs.first() {
        block.add_signature(bootstrap.sign_hash(&hash));
    }
    block
}

/// A node configuration with test-friendly pacing.
pub fn test_config(dir: &Path, index: usize, mst_enable: bool) -> NodeConfig {
    NodeConfig {
        block_store_path: dir.join("blocks"),
        torii_port: 50_051 + index as u16,
        internal_port: 10_001 + index as u16,
        pg_opt: dir.join("wsv.redb").display().to_string(),
        max_proposal_size: 1024,
        proposal_delay: 100,
        vote_delay: 10,
        mst_enable,
        mst_gossip_period: 50,
        mst_expiration_time: 300_000,
        proposal_limit: 3,
        mst_gossip_amount: 2,
    }
}

/// A running in-process cluster.
pub struct TestCluster {
    /// The running nodes, in validator order of creation.
    pub nodes: Vec<Arc<Node>>,
    /// The keys and genesis the cluster was built from.
    pub fixture: ClusterFixture,
    /// The router connecting the nodes.
    pub network: Arc<InProcessNetwork>,
    _dirs: Vec<tempfile::TempDir>,
}

impl TestCluster {
    /// Stops every node and pump task.
    pub fn shutdown(&self) {
        for node in &self.nodes {
            node.shutdown();
        }
        self.network.shutdown();
    }

    /// A transaction by `admin@test`, signed and ready to submit.
    pub fn admin_tx(&self, commands: Vec<Command>) -> Transaction {
        signed_tx("admin@test", 1, &[&self.fixture.admin_pair], commands)
    }

    /// Polls until `node` reaches `height`, panicking after `timeout`.
    pub async fn wait_for_height(&self, node: &Arc<Node>, height: u64, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if node.top_height() >= height {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "node {} stuck at height {} waiting for {height}",
                    node.own_peer().public_key,
                    node.top_height()
                );
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Polls until the transaction reaches `expected` status.
    pub async fn wait_for_status(
        &self,
        node: &Arc<Node>,
        hash: Hash,
        expected: TxStatus,
        timeout: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if node.tx_status(&hash) == Some(expected) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "tx {hash} never reached {expected:?}; last status {:?}",
                    node.tx_status(&hash)
                );
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// A signed transaction with the given creator, quorum and signers.
pub fn signed_tx(
    creator: &str,
    quorum: u32,
    signers: &[&KeyPair],
    commands: Vec<Command>,
) -> Transaction {
    let mut tx = Transaction::new(TransactionPayload {
        creator_account_id: creator.parse().expect("account id"),
        created_time: meridian_types::app::current_time_ms(),
        quorum,
        commands,
    });
    let hash = tx.hash();
    for signer in signers {
        tx.add_signature(signer.sign_hash(&hash));
    }
    tx
}

/// Spawns an `n`-node cluster over the in-process router with the given
/// genesis extras.
pub async fn spawn_cluster(
    n: usize,
    mst_enable: bool,
    extra_genesis_commands: Vec<Command>,
) -> TestCluster {
    let node_pairs: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    let admin_pair = KeyPair::generate();
    let genesis_block = build_genesis(&node_pairs, &admin_pair, extra_genesis_commands);

    let network = InProcessNetwork::new();
    let mut nodes = Vec::with_capacity(n);
    let mut dirs = Vec::with_capacity(n);

    for (index, pair) in node_pairs.iter().enumerate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(dir.path(), index, mst_enable);

        let storage = Arc::new(
            Storage::open(Path::new(&config.pg_opt), &config.block_store_path)
                .expect("open storage"),
        );
        genesis::install_genesis(&storage, &genesis_block).expect("install genesis");

        let endpoint = network.endpoint(peer_of(pair, index));
        let stack = NetworkStack {
            ordering: endpoint.clone(),
            yac: endpoint.clone(),
            mst: endpoint.clone(),
            loader: endpoint,
        };

        let node = Node::start(&config, pair.clone(), storage, stack).await;
        network.register(node.clone());
        nodes.push(node);
        dirs.push(dir);
    }

    // Only kick the rounds off once every node is reachable, so no
    // first-round vote is lost to a peer that has not registered yet.
    for node in &nodes {
        node.kick_off().await;
    }

    TestCluster {
        nodes,
        fixture: ClusterFixture {
            node_pairs,
            admin_pair,
            genesis: genesis_block,
        },
        network,
        _dirs: dirs,
    }
}
