//! Accountable custody operator CLI.
//!
//! Command-line front-end for the custody operator. Provides commands for:
//! - Operator key and depositor custody addresses
//! - Deposit scanning and protocol balance
//! - Commitment and signature share inspection
//! - Key recovery and slashing
//! - Co-signed and self-signed withdrawals

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod config;
mod output;

use commands::AppContext;
use config::CustodyConfig;
use custody_types::DEFAULT_LIST_LIMIT;
use output::OutputFormatter;

#[derive(Parser)]
#[command(name = "custody")]
#[command(author, version, about = "Accountable custody operator CLI", long_about = None)]
struct Cli {
    /// Config file (defaults to ./custody.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Network override: livenet, testnet, signet, devnet
    #[arg(long, global = true)]
    network: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the operator co-signing key and penalty address
    OperatorKey,

    /// Custody addresses of a depositor, one per lock
    Addresses {
        /// Depositor public key (compressed hex)
        #[arg(long, value_name = "PUBKEY")]
        depositor: String,
    },

    /// Deposits on a depositor's custody addresses with lock status
    Utxos {
        #[arg(long, value_name = "PUBKEY")]
        depositor: String,
    },

    /// Balance across all custody addresses of a depositor
    Balance {
        #[arg(long, value_name = "PUBKEY")]
        depositor: String,
    },

    /// Commitment operations
    #[command(subcommand)]
    Commitments(CommitmentCommands),

    /// Signature share operations
    #[command(subcommand)]
    Shares(ShareCommands),

    /// Recover the one-time key of a commitment from its shares
    Recover {
        txid: String,
        /// Commitment nonce (decimal or 0x-prefixed hex)
        nonce: String,
    },

    /// Build the commitment and slash transactions for a slashable commitment
    Slash {
        txid: String,
        nonce: String,

        /// Penalty address (defaults to the operator penalty key)
        #[arg(long, value_name = "ADDRESS")]
        penalty: Option<String>,

        /// Broadcast both transactions
        #[arg(long)]
        broadcast: bool,
    },

    /// Withdraw deposits to an address
    Withdraw {
        /// Depositor secret key (hex)
        #[arg(long, value_name = "HEX")]
        depositor_key: String,

        /// Destination address
        #[arg(long, value_name = "ADDRESS")]
        to: String,

        /// Stop selecting deposits once this many sats are covered
        #[arg(long, value_name = "SATS")]
        amount: Option<u64>,

        /// Print the plan without signing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum CommitmentCommands {
    /// Most recent commitments on the configured network
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Verify and register a depositor-signed commitment
    Register(commands::commitments::RegisterArgs),

    /// Commitments of a deposit
    Show {
        txid: String,
        /// Only this nonce
        #[arg(long)]
        nonce: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShareCommands {
    /// Published shares of a commitment
    List { txid: String, nonce: String },

    /// Derive a share from the depositor secret and publish it
    Create {
        txid: String,
        nonce: String,
        /// up or down
        tag: String,
        /// Depositor secret the one-time key was derived from
        #[arg(long, value_name = "SECRET")]
        secret: String,
    },

    /// Submit a share
    Submit {
        txid: String,
        nonce: String,
        /// up or down
        tag: String,
        /// Share scalar (32-byte hex)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CustodyConfig::load(cli.config.as_deref())?;
    if let Some(network) = &cli.network {
        config.network = network.parse()?;
    }
    config.validate()?;

    init_tracing(&config.logging.level, &config.logging.format);

    let formatter = OutputFormatter::new(!cli.no_color, cli.json);

    if let Commands::Config = cli.command {
        return show_config(&config, &formatter);
    }

    let ctx = AppContext::new(config)?;

    let result = match cli.command {
        Commands::OperatorKey => commands::account::operator_key(&ctx, &formatter).await,
        Commands::Addresses { depositor } => {
            commands::account::addresses(&ctx, &formatter, depositor).await
        }
        Commands::Utxos { depositor } => commands::account::utxos(&ctx, &formatter, depositor).await,
        Commands::Balance { depositor } => {
            commands::account::balance(&ctx, &formatter, depositor).await
        }
        Commands::Commitments(cmd) => handle_commitment_command(cmd, &ctx, &formatter).await,
        Commands::Shares(cmd) => handle_share_command(cmd, &ctx, &formatter).await,
        Commands::Recover { txid, nonce } => {
            commands::shares::recover(&ctx, &formatter, txid, nonce).await
        }
        Commands::Slash {
            txid,
            nonce,
            penalty,
            broadcast,
        } => commands::slash::slash(&ctx, &formatter, txid, nonce, penalty, broadcast).await,
        Commands::Withdraw {
            depositor_key,
            to,
            amount,
            dry_run,
        } => {
            commands::withdraw::withdraw(&ctx, &formatter, depositor_key, to, amount, dry_run)
                .await
        }
        Commands::Config => unreachable!(), // Handled above
    };

    if let Err(e) = result {
        formatter.error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn handle_commitment_command(
    cmd: CommitmentCommands,
    ctx: &AppContext,
    formatter: &OutputFormatter,
) -> Result<()> {
    match cmd {
        CommitmentCommands::List { limit } => {
            commands::commitments::list(ctx, formatter, limit).await
        }
        CommitmentCommands::Register(args) => {
            commands::commitments::register(ctx, formatter, args).await
        }
        CommitmentCommands::Show { txid, nonce } => {
            commands::commitments::show(ctx, formatter, txid, nonce).await
        }
    }
}

async fn handle_share_command(
    cmd: ShareCommands,
    ctx: &AppContext,
    formatter: &OutputFormatter,
) -> Result<()> {
    match cmd {
        ShareCommands::List { txid, nonce } => {
            commands::shares::list(ctx, formatter, txid, nonce).await
        }
        ShareCommands::Create {
            txid,
            nonce,
            tag,
            secret,
        } => commands::shares::create(ctx, formatter, txid, nonce, tag, secret).await,
        ShareCommands::Submit {
            txid,
            nonce,
            tag,
            value,
        } => commands::shares::submit(ctx, formatter, txid, nonce, tag, value).await,
    }
}

fn show_config(config: &CustodyConfig, formatter: &OutputFormatter) -> Result<()> {
    if formatter.json_mode {
        return formatter.json(config);
    }
    formatter.header("Current Configuration");
    formatter.kv("Network", &config.network.to_string());
    formatter.kv("Database", &config.db_path.display().to_string());
    formatter.kv(
        "Indexer",
        config
            .indexer_url
            .as_deref()
            .unwrap_or(&config.network.api_url()),
    );
    formatter.kv("Locks", &format!("{:?}", config.locks));
    formatter.kv("Dust floor", &formatter.format_sats(config.dust_floor));
    formatter.kv("Unconfirmed inputs", &config.unconfirmed.mode);
    formatter.kv(
        "Operator seed",
        if config.operator_seed.is_empty() {
            "not set"
        } else {
            "set"
        },
    );
    Ok(())
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
