//! Contract State Client CLI Application
//!
//! A command-line interface for reading and mutating the counter/message
//! contract through the reconciling state client.

use clap::{Parser, Subcommand};
use contract_state_client::cli::{self, AppState};
use contract_state_client::config::ClientConfig;
use contract_state_client::wallet::ApprovalPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "contract-client")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Read and mutate a ledger-backed counter/message contract", long_about = None)]
struct Cli {
    /// Data directory for the wallet and development ledger
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a field (number or message) from the contract
    Read {
        /// Field name
        field: String,
    },

    /// Authorize and submit a state-changing operation
    Mutate {
        /// Operation name (increaseNumber, decreaseNumber, setMessage)
        operation: String,

        /// Operation inputs, in declaration order
        args: Vec<String>,

        /// Refuse authorization (no call is submitted)
        #[arg(long, conflicts_with = "prompt")]
        deny: bool,

        /// Ask on stdin before granting the account
        #[arg(long)]
        prompt: bool,
    },

    /// Read every field and print the snapshot
    Snapshot,

    /// Start the REST/WebSocket API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Ask on stdin before granting the account
        #[arg(long)]
        prompt: bool,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Run a read / mutate / read-after-write walkthrough on a throwaway ledger
    Demo,
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    New {
        /// Optional label for the wallet
        #[arg(short, long)]
        label: Option<String>,

        /// Replace an existing wallet
        #[arg(long)]
        force: bool,
    },

    /// Show the wallet address
    Show,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    let mut config = ClientConfig::load_or_default(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match args.command {
            Commands::Wallet { action } => match action {
                WalletCommands::New { label, force } => {
                    cli::cmd_wallet_new(&config, label.as_deref(), force)
                }
                WalletCommands::Show => cli::cmd_wallet_show(&config),
            },

            Commands::Demo => cli::cmd_demo(&config).await,

            Commands::Read { field } => {
                let state = AppState::new(config, ApprovalPolicy::AutoApprove)?;
                cli::cmd_read(&state, &field).await
            }

            Commands::Mutate {
                operation,
                args,
                deny,
                prompt,
            } => {
                let policy = if deny {
                    ApprovalPolicy::Deny
                } else if prompt {
                    ApprovalPolicy::Prompt(cli::spawn_stdin_approver())
                } else {
                    ApprovalPolicy::AutoApprove
                };
                let state = AppState::new(config, policy)?;
                cli::cmd_mutate(&state, &operation, &args).await
            }

            Commands::Snapshot => {
                let state = AppState::new(config, ApprovalPolicy::AutoApprove)?;
                cli::cmd_snapshot(&state).await
            }

            Commands::Serve { port, prompt } => {
                let policy = if prompt {
                    ApprovalPolicy::Prompt(cli::spawn_stdin_approver())
                } else {
                    ApprovalPolicy::AutoApprove
                };
                let state = AppState::new(config, policy)?;
                cli::cmd_serve(&state, port).await
            }
        }
    })
}
