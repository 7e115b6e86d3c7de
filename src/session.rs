//! Wallet session: the one unlocked wallet plus the active network.
//!
//! Everything a front end does maps onto one call here. The chain client is
//! rebuilt through the [`ClientFactory`] whenever the network changes; each
//! change bumps a generation counter so transactions sent earlier can be
//! recognized as stale.

use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::blockchain::ethereum::EthereumClientFactory;
use crate::blockchain::traits::{ChainClient, ClientFactory};
use crate::core::accounts::{AccountRegistry, AccountSummary};
use crate::core::config::{Network, WalletConfig};
use crate::core::errors::WalletError;
use crate::core::transaction::{GasParams, TrackedTransaction, TransactionManager};
use crate::core::wallet::Wallet;
use crate::keystore::KeyStore;

pub struct WalletSession {
    config: WalletConfig,
    keystore: KeyStore,
    factory: Arc<dyn ClientFactory>,
    registry: AccountRegistry,
    transactions: TransactionManager,
    network: Network,
    client: Arc<dyn ChainClient>,
    generation: u64,
    wallet: Option<Wallet>,
}

impl WalletSession {
    /// Connect to the first configured network. No wallet is unlocked yet.
    pub async fn new(
        config: WalletConfig,
        keystore: KeyStore,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        let network = config.default_network()?.clone();
        let client = factory.connect(&network).await?;
        info!(network = %network.name, "Wallet session started");
        Ok(Self {
            config,
            keystore,
            factory,
            registry: AccountRegistry::new(),
            transactions: TransactionManager::new(),
            network,
            client,
            generation: 0,
            wallet: None,
        })
    }

    /// File keystore and JSON-RPC clients, both from `config`.
    pub async fn from_config(config: WalletConfig) -> Result<Self, WalletError> {
        let keystore = KeyStore::from_config(&config.keystore);
        let factory = Arc::new(EthereumClientFactory::new(config.transaction.clone()));
        Self::new(config, keystore, factory).await
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn networks(&self) -> &[Network] {
        &self.config.networks
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn keystore_exists(&self) -> Result<bool, WalletError> {
        self.keystore.exists()
    }

    pub fn is_unlocked(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    /// Create a new keystore, replacing any persisted one, and unlock it.
    pub async fn create(&mut self, password: Zeroizing<String>) -> Result<Vec<AccountSummary>, WalletError> {
        self.create_with_accounts(password, 1).await
    }

    pub async fn create_with_accounts(
        &mut self,
        password: Zeroizing<String>,
        count: usize,
    ) -> Result<Vec<AccountSummary>, WalletError> {
        let (wallet, _record) = self.keystore.create_blocking_task(password, count).await?;
        self.replace_wallet(wallet);
        self.refresh_accounts().await
    }

    pub async fn unlock(&mut self, password: Zeroizing<String>) -> Result<Vec<AccountSummary>, WalletError> {
        let wallet = self.keystore.unlock_blocking_task(password).await?;
        self.replace_wallet(wallet);
        self.refresh_accounts().await
    }

    /// Zero all private keys and forget the wallet.
    pub fn logout(&mut self) {
        if let Some(mut wallet) = self.wallet.take() {
            wallet.lock();
            info!("Logged out");
        }
    }

    /// Point the session at another configured network. Balances of an unlocked
    /// wallet are refreshed against it; the previous client stays active if the
    /// new one cannot be built.
    pub async fn select_network(&mut self, name: &str) -> Result<Vec<AccountSummary>, WalletError> {
        let network = self
            .config
            .network(name)
            .cloned()
            .ok_or_else(|| WalletError::NotFoundError(format!("Unknown network '{}'", name)))?;
        let client = self.factory.connect(&network).await?;

        self.network = network;
        self.client = client;
        self.generation += 1;
        info!(network = %self.network.name, generation = self.generation, "Network selected");

        if self.wallet.is_some() {
            self.refresh_accounts().await
        } else {
            Ok(Vec::new())
        }
    }

    /// Re-read every balance from the active network.
    pub async fn refresh_accounts(&mut self) -> Result<Vec<AccountSummary>, WalletError> {
        let wallet = self
            .wallet
            .as_mut()
            .ok_or_else(|| WalletError::InvalidState("Wallet is locked".into()))?;
        Ok(self.registry.refresh_all(wallet, self.client.as_ref()).await)
    }

    /// Cached balances, without network access.
    pub fn accounts(&self) -> Result<Vec<AccountSummary>, WalletError> {
        let wallet = self.unlocked()?;
        Ok(self.registry.cached(wallet))
    }

    /// Send `amount` display units from account `account_index` to `to` with the
    /// configured gas settings.
    pub async fn send(
        &self,
        account_index: usize,
        to: &str,
        amount: &str,
    ) -> Result<TrackedTransaction, WalletError> {
        let gas = GasParams::from_config(&self.config.transaction);
        self.send_with_gas(account_index, to, amount, gas).await
    }

    pub async fn send_with_gas(
        &self,
        account_index: usize,
        to: &str,
        amount: &str,
        gas: GasParams,
    ) -> Result<TrackedTransaction, WalletError> {
        let wallet = self.unlocked()?;
        let account = wallet.account(account_index).ok_or_else(|| {
            WalletError::NotFoundError(format!("No account at index {}", account_index))
        })?;

        let tx = self.transactions.build(
            account.address(),
            to,
            amount,
            self.network.decimals,
            gas,
        )?;
        let tx = self.transactions.sign(tx, account, self.client.as_ref()).await?;
        let mut tracked = self.transactions.broadcast(tx, self.client.as_ref()).await?;
        tracked.set_generation(self.generation);
        Ok(tracked)
    }

    /// Whether `tracked` was sent on a network that has since been replaced.
    pub fn is_stale(&self, tracked: &TrackedTransaction) -> bool {
        tracked.is_stale(self.generation)
    }

    fn unlocked(&self) -> Result<&Wallet, WalletError> {
        self.wallet
            .as_ref()
            .ok_or_else(|| WalletError::InvalidState("Wallet is locked".into()))
    }

    fn replace_wallet(&mut self, wallet: Wallet) {
        if self.wallet.is_some() {
            warn!("Replacing the unlocked wallet");
        }
        self.logout();
        self.wallet = Some(wallet);
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.logout();
    }
}
