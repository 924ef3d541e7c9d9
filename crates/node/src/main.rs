// Path: crates/node/src/main.rs
//! The `meridiand` daemon.

use clap::Parser;
use meridian_node::{network, telemetry, Node};
use meridian_storage::Storage;
use meridian_types::config::NodeConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG: u8 = 1;
const EXIT_STORAGE: u8 = 2;
const EXIT_MISSING_FLAG: u8 = 3;

/// A validating peer of a Meridian cluster.
#[derive(Debug, Parser)]
#[command(name = "meridiand", version, about)]
struct Args {
    /// Path to the node configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the genesis block file (JSON). Required on first start.
    #[arg(long)]
    genesis_block: Option<PathBuf>,

    /// Keypair basename; `<basename>.pub` and `<basename>.priv` are read.
    #[arg(long)]
    keypair_name: Option<PathBuf>,

    /// Drop the whole ledger (world state and block files) on startup.
    #[arg(long)]
    overwrite_ledger: bool,
}

fn main() -> ExitCode {
    if let Err(e) = telemetry::init_tracing() {
        eprintln!("failed to initialize tracing: {e}");
        return ExitCode::from(EXIT_CONFIG);
    }

    let args = Args::parse();
    let Some(config_path) = args.config else {
        error!("--config is required");
        return ExitCode::from(EXIT_MISSING_FLAG);
    };
    let Some(keypair_name) = args.keypair_name else {
        error!("--keypair_name is required");
        return ExitCode::from(EXIT_MISSING_FLAG);
    };

    let config = match NodeConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let key_pair = match meridian_crypto::load_keypair(&keypair_name) {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "could not load keypair");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let storage = match Storage::open(
        &PathBuf::from(&config.pg_opt),
        &config.block_store_path,
    ) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!(error = %e, "storage initialization failed");
            return ExitCode::from(EXIT_STORAGE);
        }
    };

    if args.overwrite_ledger {
        if let Err(e) = storage.drop_ledger() {
            error!(error = %e, "could not overwrite the ledger");
            return ExitCode::from(EXIT_STORAGE);
        }
    }

    let is_empty = match meridian_api::state::BlockQuery::top_height(storage.as_ref()) {
        Ok(height) => height == 0,
        Err(e) => {
            error!(error = %e, "could not read the ledger height");
            return ExitCode::from(EXIT_STORAGE);
        }
    };
    if is_empty {
        let Some(genesis_path) = args.genesis_block else {
            error!("--genesis_block is required on first start");
            return ExitCode::from(EXIT_MISSING_FLAG);
        };
        let genesis = match meridian_node::genesis::load_genesis_block(&genesis_path) {
            Ok(block) => block,
            Err(e) => {
                error!(error = %e, "invalid genesis block");
                return ExitCode::from(EXIT_CONFIG);
            }
        };
        if let Err(e) = meridian_node::genesis::install_genesis(&storage, &genesis) {
            error!(error = %e, "could not install the genesis block");
            return ExitCode::from(EXIT_STORAGE);
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "could not start the runtime");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    runtime.block_on(async move {
        // The wire transport is attached here; without one configured the
        // node runs its single-peer loopback stack.
        let (networks, loopback) = network::loopback_stack();
        let node = Node::start(&config, key_pair, storage, networks).await;
        let router = network::attach_loopback(node.clone(), loopback);
        node.kick_off().await;

        info!("meridiand is up; press ctrl-c to stop");
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
        node.shutdown();
        router.abort();
    });

    ExitCode::from(EXIT_OK)
}
