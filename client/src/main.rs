use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueHint};
use tracing_subscriber::EnvFilter;
use xescrow_client::commands::{cancel_escrow, create_escrow, finish_escrow, EscrowFiles};
use xescrow_client::faucet::fund_wallet;
use xescrow_client::interface::{
    load_escrow_data, save_escrow_data, EscrowParams, LedgerConfig, Wallet,
};
use xescrow_client::ledger::{JsonRpcLedger, Ledger, MemoryLedger};
use xescrow_client::EscrowLifecycle;
use xescrow_core::{generate, xrp_to_drops};

const DEFAULT_LEDGER_CONFIG_PATH: &str = "./templates/ledger_config.json";
const DEFAULT_ESCROW_PARAMS_PATH: &str = "./templates/escrow_params.json";
const DEFAULT_ESCROW_METADATA_PATH: &str = "./escrow_metadata.json";
const DEFAULT_ESCROW_SECRET_PATH: &str = "./escrow_secret.json";

/// Faucet payments validate a ledger or two after the faucet answers.
const FUNDING_SETTLE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { outfile } => {
            let pair = generate()?;
            println!("Condition: {}", pair.condition_hex());
            println!(
                "Fulfillment (keep secret until you want to finish the escrow): {}",
                pair.fulfillment_hex()
            );
            if let Some(path) = outfile {
                save_escrow_data(&path, &pair)?;
                tracing::info!("Condition and fulfillment saved to {:?}", path);
            }
        }
        Commands::Create {
            config,
            params,
            creator,
            destination,
            outfile,
            secret,
        } => {
            let config = load_config(&config, cli.rpc_url)?;
            let params: EscrowParams = load_escrow_data(&params)?;
            let creator: Wallet = load_escrow_data(&creator)?;
            let files = EscrowFiles {
                metadata: outfile,
                secret,
            };

            let lifecycle = EscrowLifecycle::new(JsonRpcLedger::new(&config)?);
            let metadata = create_escrow(&lifecycle, &creator, destination, &params, &files).await?;
            if let Some(condition) = metadata.escrow.condition {
                println!("Condition: {}", condition);
            }
            println!("Offer sequence: {}", metadata.escrow.offer_sequence);
            println!("Fulfillment kept in {:?}", files.secret);
        }
        Commands::Finish {
            config,
            metadata,
            secret,
            signer,
            no_wait,
        } => {
            let config = load_config(&config, cli.rpc_url)?;
            let signer: Wallet = load_escrow_data(&signer)?;
            let files = EscrowFiles { metadata, secret };

            let lifecycle = EscrowLifecycle::new(JsonRpcLedger::new(&config)?);
            finish_escrow(&lifecycle, &signer, &files, !no_wait).await?;
        }
        Commands::Cancel {
            config,
            metadata,
            signer,
        } => {
            let config = load_config(&config, cli.rpc_url)?;
            let signer: Wallet = load_escrow_data(&signer)?;

            let lifecycle = EscrowLifecycle::new(JsonRpcLedger::new(&config)?);
            cancel_escrow(&lifecycle, &signer, &metadata).await?;
        }
        Commands::Demo {
            config,
            amount,
            wait_secs,
            dry_run,
        } => {
            let drops = xrp_to_drops(&amount)?;
            let wait = Duration::from_secs(wait_secs);
            if dry_run {
                let creator = Wallet::new("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe", "");
                let destination = Wallet::new("rGWrZyQqhTp9Xu7G5Pkayo7bXjH4k4QYpf", "");
                let lifecycle = EscrowLifecycle::new(MemoryLedger::new());
                demo(&lifecycle, &creator, &destination, drops, wait).await?;
            } else {
                let config = load_config(&config, cli.rpc_url)?;
                tracing::info!("Generating funded wallets...");
                let creator = fund_wallet(&config).await?;
                let destination = fund_wallet(&config).await?;
                tokio::time::sleep(FUNDING_SETTLE).await;

                let lifecycle = EscrowLifecycle::new(JsonRpcLedger::new(&config)?);
                demo(&lifecycle, &creator, &destination, drops, wait).await?;
            }
        }
    }

    Ok(())
}

async fn demo<L: Ledger>(
    lifecycle: &EscrowLifecycle<L>,
    creator: &Wallet,
    destination: &Wallet,
    drops: u64,
    wait: Duration,
) -> anyhow::Result<()> {
    println!("Creating an escrow with a crypto condition!");
    println!("Creator: {}", creator.address);
    println!("Destination: {}", destination.address);

    let report = lifecycle.run(creator, destination, drops, wait).await?;
    println!("Condition: {}", report.condition.condition_hex());
    println!("Fulfillment: {}", report.condition.fulfillment_hex());
    println!(
        "Escrow {} created in {} and finished in {}",
        report.escrow.offer_sequence, report.create.hash, report.finish.hash
    );
    Ok(())
}

/// Reads the ledger config, letting `--rpc-url` override the file.
fn load_config(path: &PathBuf, rpc_url: Option<String>) -> anyhow::Result<LedgerConfig> {
    let mut config: LedgerConfig =
        load_escrow_data(path).with_context(|| "loading ledger config")?;
    if let Some(url) = rpc_url {
        config.rpc_url = url;
    }
    Ok(config)
}

#[derive(Parser)]
#[command(name = "xescrow-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Overrides `rpc_url` from the ledger config.
    #[arg(long, global = true, env = "XESCROW_RPC_URL")]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a condition and fulfillment.
    Generate {
        #[arg(short, long, value_parser, value_hint = ValueHint::FilePath)]
        outfile: Option<PathBuf>,
    },
    /// Create a conditional escrow.
    Create {
        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_LEDGER_CONFIG_PATH,
            value_hint = ValueHint::FilePath)]
        config: PathBuf,

        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_PARAMS_PATH,
            value_hint = ValueHint::FilePath)]
        params: PathBuf,

        /// Wallet file of the funding account.
        #[arg(long, value_parser, value_hint = ValueHint::FilePath)]
        creator: PathBuf,

        /// Destination address.
        #[arg(short, long)]
        destination: String,

        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_METADATA_PATH,
            value_hint = ValueHint::FilePath)]
        outfile: PathBuf,

        /// Where to keep the condition and fulfillment.
        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_SECRET_PATH,
            value_hint = ValueHint::FilePath)]
        secret: PathBuf,
    },
    /// Finish an escrow by revealing its fulfillment.
    Finish {
        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_LEDGER_CONFIG_PATH,
            value_hint = ValueHint::FilePath)]
        config: PathBuf,

        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_METADATA_PATH,
            value_hint = ValueHint::FilePath)]
        metadata: PathBuf,

        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_SECRET_PATH,
            value_hint = ValueHint::FilePath)]
        secret: PathBuf,

        /// Wallet file of the submitting account.
        #[arg(long, value_parser, value_hint = ValueHint::FilePath)]
        signer: PathBuf,

        /// Submit immediately instead of waiting for the time gate.
        #[arg(long)]
        no_wait: bool,
    },
    /// Cancel an escrow, returning the funds to its owner.
    Cancel {
        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_LEDGER_CONFIG_PATH,
            value_hint = ValueHint::FilePath)]
        config: PathBuf,

        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_ESCROW_METADATA_PATH,
            value_hint = ValueHint::FilePath)]
        metadata: PathBuf,

        /// Wallet file of the submitting account.
        #[arg(long, value_parser, value_hint = ValueHint::FilePath)]
        signer: PathBuf,
    },
    /// Run create, wait and finish end to end with fresh faucet wallets.
    Demo {
        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_LEDGER_CONFIG_PATH,
            value_hint = ValueHint::FilePath)]
        config: PathBuf,

        /// Amount to lock, in XRP.
        #[arg(short, long, default_value = "1")]
        amount: String,

        /// Seconds until the escrow may be finished.
        #[arg(short, long, default_value_t = 15)]
        wait_secs: u64,

        /// Run against an in-process ledger instead of the network.
        #[arg(long)]
        dry_run: bool,
    },
}
