use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crypto wallet CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "crypto-wallet", about = "Encrypted keystore wallet", version)]
pub struct Cli {
    /// Config file; overrides CONFIG_PATH
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List configured networks
    Networks,
    /// Create a new keystore, replacing the existing one
    Create {
        /// Number of accounts to generate
        #[arg(long, default_value_t = 1)]
        accounts: usize,
        /// Overwrite an existing keystore without asking
        #[arg(long)]
        force: bool,
    },
    /// Unlock the keystore and show balances
    Accounts {
        #[arg(long)]
        network: Option<String>,
    },
    /// Send native currency from one account
    Send {
        /// Account index as listed by `accounts`
        #[arg(long, default_value_t = 0)]
        account: usize,
        #[arg(long)]
        to: String,
        /// Amount in display units, e.g. 0.5
        #[arg(long)]
        amount: String,
        #[arg(long)]
        network: Option<String>,
        /// Override the configured gas limit
        #[arg(long)]
        gas_limit: Option<u64>,
        /// Return after the hash instead of waiting for the receipt
        #[arg(long)]
        no_wait: bool,
    },
}
