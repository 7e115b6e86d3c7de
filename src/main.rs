// src/main.rs
//! Crypto wallet command line entry point.
use anyhow::{Context, Result};
use clap::Parser;
use crypto_wallet::blockchain::events::TxEvent;
use crypto_wallet::cli::{Cli, Commands};
use crypto_wallet::core::accounts::AccountSummary;
use crypto_wallet::core::config::WalletConfig;
use crypto_wallet::core::errors::WalletError;
use crypto_wallet::core::transaction::GasParams;
use crypto_wallet::session::WalletSession;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging()?;

    info!("Starting crypto-wallet v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => WalletConfig::load(path)?,
        None => WalletConfig::load_from_env()?,
    };

    match cli.command {
        Commands::Networks => print_networks(&config),
        Commands::Create { accounts, force } => {
            let mut session = WalletSession::from_config(config).await?;
            if session.keystore_exists()? && !force {
                anyhow::bail!("A keystore already exists; pass --force to replace it");
            }
            let password = read_password(true)?;
            let summaries = session.create_with_accounts(password, accounts).await?;
            println!("Created keystore on {}", session.network().name);
            print_accounts(&summaries);
        }
        Commands::Accounts { network } => {
            let mut session = WalletSession::from_config(config).await?;
            if let Some(name) = network.as_deref() {
                session.select_network(name).await?;
            }
            let summaries = session.unlock(read_password(false)?).await?;
            println!("Network: {}", session.network().name);
            print_accounts(&summaries);
        }
        Commands::Send { account, to, amount, network, gas_limit, no_wait } => {
            let mut session = WalletSession::from_config(config).await?;
            if let Some(name) = network.as_deref() {
                session.select_network(name).await?;
            }
            session.unlock(read_password(false)?).await?;

            let mut gas = GasParams::from_config(&session.config().transaction);
            if let Some(limit) = gas_limit {
                gas.gas_limit = limit.into();
            }
            let mut tracked = session.send_with_gas(account, &to, &amount, gas).await?;
            let explorer = session.network().clone();

            while let Some(event) = tracked.next_event().await {
                match event {
                    TxEvent::Hash(hash) => {
                        let hash = format!("{:?}", hash);
                        println!("Transaction hash: {}", hash);
                        println!("Explorer: {}", explorer.tx_url(&hash));
                        if no_wait {
                            break;
                        }
                    }
                    TxEvent::Receipt(receipt) => {
                        let block = receipt.block_number.map(|b| b.to_string()).unwrap_or_default();
                        println!("Confirmed in block {}", block);
                    }
                    TxEvent::Error(e) => {
                        println!("Transaction failed: {}", e);
                        return Err(e.into());
                    }
                }
            }
            println!("Status: {}", tracked.transaction().status());
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=info,h2=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// WALLET_PASSWORD wins; otherwise prompt on the terminal.
fn read_password(confirm: bool) -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var("WALLET_PASSWORD") {
        return Ok(Zeroizing::new(password));
    }
    let password = Zeroizing::new(rpassword::prompt_password("Password: ").context("Failed to read password")?);
    if confirm {
        let again =
            Zeroizing::new(rpassword::prompt_password("Repeat password: ").context("Failed to read password")?);
        if *again != *password {
            return Err(WalletError::ValidationError("Passwords do not match".into()).into());
        }
    }
    Ok(password)
}

fn print_networks(config: &WalletConfig) {
    for (i, network) in config.networks.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        println!(
            "{} {:<12} chain {:<10} {} ({})",
            marker, network.name, network.chain_id, network.rpc_url, network.native_symbol
        );
    }
}

fn print_accounts(summaries: &[AccountSummary]) {
    for summary in summaries {
        println!("[{}] {}  {}", summary.index, summary.address, summary.balance);
    }
}
