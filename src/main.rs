//! Multisig coordinator CLI
//!
//! Builds, hashes and signs multisig proposals and inspects a relay service.

use alloy_primitives::U256;
use clap::{Args, Parser, Subcommand};
use multisig_coordinator::cli::{self, CliResult, ProposalInput};
use multisig_coordinator::coordinator::CoordinatorConfig;
use multisig_coordinator::relay::HttpRelayClient;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig-coordinator")]
#[command(version = "0.1.0")]
#[command(about = "Coordinate threshold authorization of multisig transactions", long_about = None)]
struct Cli {
    /// JSON config file (chain id, retries, timeouts, explorer)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Chain id; overrides the config file
    #[arg(long, env = "CHAIN_ID", global = true)]
    chain_id: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a proposal and print its canonical hash
    Hash {
        #[command(flatten)]
        proposal: ProposalArgs,
    },

    /// Sign a proposal hash with a local key
    Sign {
        /// Proposal hash (0x-prefixed)
        #[arg(long)]
        hash: String,

        /// Hex private key of the signer
        #[arg(long, env = "SIGNER_KEY", hide_env_values = true)]
        key: String,
    },

    /// Show a proposal stored at the relay
    Show {
        /// Proposal hash (0x-prefixed)
        #[arg(long)]
        hash: String,

        #[command(flatten)]
        relay: RelayArgs,
    },

    /// List unexecuted proposals of an account
    Pending {
        /// Multisig account address
        #[arg(short, long)]
        account: String,

        #[command(flatten)]
        relay: RelayArgs,
    },
}

#[derive(Args)]
struct ProposalArgs {
    /// Multisig account that executes the call
    #[arg(short, long)]
    account: String,

    /// Contract to call
    #[arg(short, long)]
    target: String,

    /// Method signature, e.g. "transfer(address,uint256)"
    #[arg(short, long)]
    method: String,

    /// Method argument; repeat once per parameter
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Native value to attach, decimal or 0x hex
    #[arg(long)]
    value: Option<U256>,

    /// Account nonce to bind the proposal to
    #[arg(short, long)]
    nonce: u64,
}

#[derive(Args)]
struct RelayArgs {
    /// Relay service base URL
    #[arg(long, env = "RELAY_URL")]
    relay_url: String,
}

fn main() -> CliResult<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => cli::load_config(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }

    match cli.command {
        Commands::Hash { proposal } => {
            let input = ProposalInput {
                account: proposal.account,
                target: proposal.target,
                method: proposal.method,
                args: proposal.args,
                value: proposal.value,
                nonce: proposal.nonce,
            };
            cli::cmd_hash(&input, &config)?;
        }

        Commands::Sign { hash, key } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_sign(&key, &hash))?;
        }

        Commands::Show { hash, relay } => {
            let rt = tokio::runtime::Runtime::new()?;
            let client = connect(&relay, &config)?;
            rt.block_on(cli::cmd_show(&client, &hash))?;
        }

        Commands::Pending { account, relay } => {
            let rt = tokio::runtime::Runtime::new()?;
            let client = connect(&relay, &config)?;
            rt.block_on(cli::cmd_pending(&client, &account))?;
        }
    }

    Ok(())
}

fn connect(relay: &RelayArgs, config: &CoordinatorConfig) -> CliResult<HttpRelayClient> {
    log::debug!("Using relay at {}", relay.relay_url);
    let client = HttpRelayClient::new(&relay.relay_url, config.chain_id, config.call_timeout())?;
    Ok(client)
}
