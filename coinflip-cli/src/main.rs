mod commands;
mod config;
mod vault;

use clap::{Parser, Subcommand};
use coinflip_core::CoinflipError;
use coinflip_ledger::BetError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coinflip")]
#[command(about = "Two-party commit/reveal coin flip")]
#[command(version)]
struct Cli {
    /// Data directory for the ledger database, vault and config
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Vault passphrase (prompted for when needed if not set)
    #[arg(long, global = true, env = "COINFLIP_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    #[command(subcommand)]
    Account(commands::AccountCommands),
    /// Propose a bet, committing to a fresh secret
    Propose {
        /// Account placing the bet
        account: String,
        /// Stake in satoshis
        stake: u64,
        /// Use this secret (hex) instead of generating one
        #[arg(long)]
        secret: Option<String>,
    },
    /// Accept a proposed bet
    Accept {
        /// Account taking the bet
        account: String,
        /// Commitment of the bet (hex)
        commitment: String,
        /// Stake to attach; defaults to the proposer's stake
        #[arg(long)]
        stake: Option<u64>,
        /// Use this secret (hex) instead of generating one
        #[arg(long)]
        secret: Option<String>,
    },
    /// Reveal your sealed secret
    Reveal {
        /// Account that holds the secret
        account: String,
        /// Commitment of the bet (hex)
        commitment: String,
    },
    /// Claim the pot from a counterparty that failed to reveal
    Forfeit {
        /// Claiming account
        account: String,
        /// Commitment of the bet (hex)
        commitment: String,
    },
    /// Show the state of one bet
    Status {
        /// Commitment of the bet (hex)
        commitment: String,
    },
    /// List open bets
    List,
    /// Show the event log
    Events {
        /// Only show events after this sequence number
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the active configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "coinflip={},coinflip_ledger={},coinflip_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(config::default_data_dir);
    let ctx = commands::Context::open(data_dir, cli.passphrase).await?;

    let result = match cli.command {
        Commands::Account(cmd) => commands::handle_account_command(cmd, &ctx).await,
        Commands::Propose {
            account,
            stake,
            secret,
        } => commands::propose_bet(&ctx, &account, stake, secret.as_deref()).await,
        Commands::Accept {
            account,
            commitment,
            stake,
            secret,
        } => {
            commands::accept_bet(&ctx, &account, &commitment, stake, secret.as_deref()).await
        }
        Commands::Reveal {
            account,
            commitment,
        } => commands::reveal_bet(&ctx, &account, &commitment).await,
        Commands::Forfeit {
            account,
            commitment,
        } => commands::forfeit_bet(&ctx, &account, &commitment).await,
        Commands::Status { commitment } => commands::show_status(&ctx, &commitment).await,
        Commands::List => commands::list_bets(&ctx).await,
        Commands::Events { since } => commands::show_events(&ctx, since).await,
        Commands::Config(ConfigCommands::Show) => commands::show_config(&ctx).await,
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn report(e: &anyhow::Error) {
    let platform = e
        .downcast_ref::<CoinflipError>()
        .or_else(|| match e.downcast_ref::<BetError>() {
            Some(BetError::Platform(inner)) => Some(inner),
            _ => None,
        });

    match (e.downcast_ref::<BetError>(), platform) {
        (_, Some(CoinflipError::AccountNotFound { name })) => {
            eprintln!("Error: Account '{}' not found", name);
            eprintln!("Use 'coinflip account list' to see available accounts");
        }
        (_, Some(CoinflipError::InsufficientFunds { need, available })) => {
            eprintln!("Error: Insufficient funds");
            eprintln!("Need: {} sats, Available: {} sats", need, available);
        }
        (Some(BetError::TimeoutNotElapsed { deadline }), _) => {
            eprintln!("Error: The counterparty still has time to reveal");
            eprintln!("Forfeit can be claimed after {}", deadline);
        }
        (Some(BetError::RevealRequired), _) => {
            eprintln!("Error: {}", e);
            eprintln!("Use 'coinflip reveal <account> <commitment>' first");
        }
        _ => {
            eprintln!("Error: {:#}", e);
        }
    }
}
