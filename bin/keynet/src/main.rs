//! KeyNet node tooling
//!
//! `keynet init-config` writes a network configuration file and `keynet simulate` drives an
//! in-process network through staking, epoch advances, key routing and permission grants.

#![allow(missing_docs)]

use alloy_primitives::{Address, U256, hex, keccak256};
use clap::{Parser, Subcommand, ValueEnum};
use keynet_config::{NetworkConfig, NetworkType};
use keynet_node::{Network, NetworkHandle, NetworkService};
use keynet_primitives::{NodeId, StakerId};
use keynet_routing::{RoutingData, VoteOutcome};
use keynet_staking::{CommsKeys, InMemoryToken, NodeEndpoint};
use std::{collections::HashMap, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Compressed secp256k1 generator point, routed as the demo key
const DEMO_PUBKEY: [u8; 33] =
    hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");

/// Key type tag of the demo key
const DEMO_KEY_TYPE: u8 = 2;

/// KeyNet node tooling
#[derive(Debug, Parser)]
#[command(name = "keynet", version, about = "KeyNet staking, routing and permissions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a preset network config
    InitConfig {
        /// Network preset
        #[arg(long, value_enum, default_value_t = NetworkArg::Devnet)]
        network: NetworkArg,

        /// Admin identity
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
        admin: Address,

        /// Output file
        #[arg(long, short = 'o', default_value = "keynet.json")]
        output: PathBuf,
    },
    /// Run a local network through a few epochs
    Simulate {
        /// Config file, devnet presets if omitted
        #[arg(long, env = "KEYNET_CONFIG")]
        config: Option<PathBuf>,

        /// Number of validators
        #[arg(long, short = 'n', default_value = "10")]
        validators: u8,

        /// Number of epoch advances
        #[arg(long, short = 'e', default_value = "3")]
        epochs: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet,
    Devnet,
}

impl From<NetworkArg> for NetworkType {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Mainnet => Self::Mainnet,
            NetworkArg::Testnet => Self::Testnet,
            NetworkArg::Devnet => Self::Devnet,
        }
    }
}

/// Staker and node identity of simulated validator `index`
fn simulated_identity(index: u8) -> (StakerId, NodeId) {
    let staker = Address::from_word(keccak256([b"staker".as_slice(), &[index]].concat()));
    let node = Address::from_word(keccak256([b"node".as_slice(), &[index]].concat()));
    (staker, node)
}

fn init_config(network: NetworkArg, admin: Address, output: PathBuf) -> eyre::Result<()> {
    let config = NetworkConfig::new(network.into()).with_admin(admin);
    config.save(&output)?;
    Ok(())
}

async fn simulate(config: Option<PathBuf>, validators: u8, epochs: u64) -> eyre::Result<()> {
    if validators == 0 {
        eyre::bail!("at least one validator is required");
    }
    let config = match config {
        Some(path) => NetworkConfig::load(path)?,
        None => NetworkConfig::devnet(),
    };
    let stake = config.minimum_stake.saturating_mul(U256::from(10u64));

    let vault = Address::from_word(keccak256(b"vault"));
    let mut network = Network::new(&config, InMemoryToken::new(vault), 0)?;
    let mut nodes = HashMap::new();
    for index in 1..=validators {
        let (staker, node) = simulated_identity(index);
        network.staking_mut().token_mut().mint(staker, stake);
        nodes.insert(staker, node);
    }

    let (service, handle) = NetworkService::spawn(network);

    for index in 1..=validators {
        let (staker, node) = simulated_identity(index);
        let endpoint = NodeEndpoint::new(0x7f00_0000 | u32::from(index), 7470);
        handle.stake_and_join(staker, stake, node, endpoint, CommsKeys::default()).await?;
    }
    info!(target: "keynet::simulate", validators, %stake, "Validators staked");

    let mut block = 0;
    for _ in 0..epochs {
        block += config.epoch_length;
        roll_epoch(&handle, &nodes, block).await?;
    }

    let data = RoutingData::new(DEMO_PUBKEY.to_vec(), vault, DEMO_KEY_TYPE);
    let key_hash = data.key_hash();
    for node in nodes.values() {
        let outcome = handle.vote_for_routing_data(*node, key_hash, data.clone()).await?;
        if outcome == VoteOutcome::Committed {
            info!(target: "keynet::simulate", %key_hash, "Key routed");
        }
    }
    if !handle.is_routed(key_hash).await? {
        warn!(target: "keynet::simulate", %key_hash, "Key did not reach the routing threshold");
    }

    let owner = Address::from_word(keccak256(b"owner"));
    let minted = handle.mint_next(owner, DEMO_KEY_TYPE).await?;
    let key_address =
        handle.with_network(move |network| network.routing().key_address(&minted)).await?;
    handle.add_permitted_address(owner, minted, owner, vec![1]).await?;
    info!(
        target: "keynet::simulate",
        key_hash = %minted,
        key_address = ?key_address,
        %owner,
        permitted = handle.get_permitted_addresses(minted).await?.len(),
        "Key minted"
    );

    handle.shutdown().await?;
    let network = service.await?;
    info!(
        target: "keynet::simulate",
        epoch = network.staking().epoch().number,
        block = network.block(),
        validators = network.staking().active_validator_count(),
        total_staked = %network.staking().total_staked(),
        routed = network.routing().routed_count(),
        "Simulation complete"
    );
    Ok(())
}

async fn roll_epoch(
    handle: &NetworkHandle<InMemoryToken>,
    nodes: &HashMap<StakerId, NodeId>,
    block: u64,
) -> eyre::Result<()> {
    let epoch = handle.epoch_number().await?;
    let next = handle.lock_validators_for_next_epoch().await?;
    for staker in &next {
        if let Some(node) = nodes.get(staker) {
            handle.signal_ready_for_next_epoch(*node, epoch).await?;
        }
    }
    handle.advance_block(block).await?;
    let number = handle.advance_epoch().await?;
    info!(
        target: "keynet::simulate",
        epoch = number,
        validators = next.len(),
        block,
        "Epoch advanced"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    match Cli::parse().command {
        Command::InitConfig { network, admin, output } => init_config(network, admin, output),
        Command::Simulate { config, validators, epochs } => {
            simulate(config, validators, epochs).await
        }
    }
}
