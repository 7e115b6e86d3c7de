use anyhow::Result;
use async_trait::async_trait;
use ethers::{
    prelude::JsonRpcClient,
    providers::{Http, Middleware, PendingTransaction, Provider, ProviderError, RpcError},
    types::{Address, BlockNumber, Bytes, U256, U64},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::events::{self, EventSender};
use super::traits::{ChainClient, ClientFactory};
use crate::core::config::{FeeMode, Network, TransactionConfig};
use crate::core::errors::WalletError;
use crate::core::transaction::FeeParams;

/// JSON-RPC client for one Ethereum-style network.
#[derive(Clone)]
pub struct EthereumClient<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    network: Network,
    confirmations: usize,
    poll_interval: Duration,
}

impl EthereumClient<Http> {
    /// Build a client for `network`. No request is made until the first call.
    pub fn new(network: &Network, tx_config: &TransactionConfig) -> Result<Self> {
        // Clean RPC URL
        let rpc_url_clean = network.rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean).map_err(|e| {
            anyhow::anyhow!(
                "Invalid RPC URL '{}' for {}: {}. Please check config.toml.",
                rpc_url_clean,
                network.name,
                e
            )
        })?;

        info!("Using {} network at {}", network.name, parsed_url);
        // Build a reqwest client with a short timeout; allow proxy environment vars.
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(tx_config.request_timeout_secs));
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let client =
            builder.build().map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let provider = Provider::new(Http::new_with_client(parsed_url, client));
        Ok(Self::new_with_provider(provider, network.clone()).with_tx_config(tx_config))
    }
}

impl<P> EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Creates a new EthereumClient with a given provider.
    /// This is useful for testing with a `MockProvider`.
    pub fn new_with_provider(provider: Provider<P>, network: Network) -> EthereumClient<P> {
        let defaults = TransactionConfig::default();
        EthereumClient {
            provider,
            network,
            confirmations: defaults.confirmations,
            poll_interval: Duration::from_millis(defaults.poll_interval_ms),
        }
    }

    pub fn with_tx_config(mut self, tx_config: &TransactionConfig) -> Self {
        self.confirmations = tx_config.confirmations.max(1);
        self.poll_interval = Duration::from_millis(tx_config.poll_interval_ms);
        self
    }

    /// Ask the node for its chain id and compare it with the configured one.
    pub async fn verify_chain_id(&self) -> Result<(), WalletError> {
        let chain_id = self.provider.get_chainid().await.map_err(|e| {
            WalletError::NetworkError(format!(
                "Failed to get chain ID from {}: {}",
                self.network.name, e
            ))
        })?;
        if chain_id != U256::from(self.network.chain_id) {
            return Err(WalletError::ConfigError(format!(
                "Network {} is configured with chain id {} but the node reports {}",
                self.network.name, self.network.chain_id, chain_id
            )));
        }
        debug!("Chain id {} confirmed for {}", chain_id, self.network.name);
        Ok(())
    }

    async fn get_gas_price(&self) -> Result<U256, WalletError> {
        debug!("get_gas_price called");
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed to get gas price: {}", e)))?;
        debug!("get_gas_price got = 0x{:x}", gas_price);
        Ok(gas_price)
    }
}

/// Node-side rejections arrive as JSON-RPC error responses; anything else is transport.
fn classify_send_error(err: &ProviderError) -> WalletError {
    match err.as_error_response() {
        Some(rpc) => WalletError::TransactionError(rpc.message.clone()),
        None => WalletError::NetworkError(format!("Failed to send transaction: {}", err)),
    }
}

async fn watch_receipt<P>(
    provider: Provider<P>,
    tx_hash: ethers::types::H256,
    confirmations: usize,
    poll_interval: Duration,
    mut sender: EventSender,
) where
    P: JsonRpcClient + Clone + Send + Sync,
{
    let pending = PendingTransaction::new(tx_hash, &provider)
        .confirmations(confirmations)
        .interval(poll_interval);

    match pending.await {
        Ok(Some(receipt)) if receipt.status == Some(U64::from(1)) => {
            info!(tx_hash = ?tx_hash, block = ?receipt.block_number, "Transaction confirmed");
            sender.receipt(receipt);
        }
        Ok(Some(receipt)) => {
            warn!(tx_hash = ?tx_hash, block = ?receipt.block_number, "Transaction reverted");
            sender.error(WalletError::TransactionError(format!(
                "Transaction 0x{} reverted",
                hex::encode(tx_hash.as_bytes())
            )));
        }
        Ok(None) => {
            warn!(tx_hash = ?tx_hash, "Transaction dropped from mempool");
            sender.error(WalletError::TransactionError("Transaction dropped from mempool".into()));
        }
        Err(e) => {
            warn!(tx_hash = ?tx_hash, "Failed to track transaction: {}", e);
            sender.error(WalletError::NetworkError(format!("Failed to track transaction: {}", e)));
        }
    }
}

#[async_trait]
impl<P> ChainClient for EthereumClient<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    fn network(&self) -> &Network {
        &self.network
    }

    async fn get_balance(&self, address: &Address) -> Result<U256, WalletError> {
        debug!(address = ?address, network = %self.network.name, "Getting balance");
        let balance = self
            .provider
            .get_balance(*address, None)
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed to get balance: {}", e)))?;
        debug!("Balance: {} wei", balance);
        Ok(balance)
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<U256, WalletError> {
        debug!(address = ?address, "Getting pending nonce");
        let nonce = self
            .provider
            .get_transaction_count(*address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed to get nonce: {}", e)))?;
        debug!("Current nonce: {}", nonce);
        Ok(nonce)
    }

    async fn suggest_fees(&self, mode: FeeMode) -> Result<FeeParams, WalletError> {
        let gas_price = self.get_gas_price().await?;
        Ok(match mode {
            FeeMode::Legacy => FeeParams::Legacy { gas_price },
            FeeMode::Eip1559 => {
                // Derive simple fee settings from gas_price
                let max_fee_per_gas = gas_price.saturating_mul(U256::from(2u64));
                let max_priority_fee_per_gas = (gas_price / U256::from(10u64))
                    .max(U256::from(1_000_000_000u64)) // >= 1 gwei
                    .min(max_fee_per_gas);
                FeeParams::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas }
            }
        })
    }

    async fn send_signed_transaction(&self, raw: Bytes) -> Result<events::TransactionHandle, WalletError> {
        let (mut sender, handle) = events::channel(&self.network.name);

        let submitted = self.provider.send_raw_transaction(raw).await.map(|pending| pending.tx_hash());
        match submitted {
            Ok(tx_hash) => {
                info!(tx_hash = ?tx_hash, network = %self.network.name, "Transaction sent");
                sender.hash(tx_hash);
                tokio::spawn(watch_receipt(
                    self.provider.clone(),
                    tx_hash,
                    self.confirmations,
                    self.poll_interval,
                    sender,
                ));
            }
            Err(e) => {
                let error = classify_send_error(&e);
                warn!(network = %self.network.name, "Transaction rejected: {}", error);
                sender.error(error);
            }
        }
        Ok(handle)
    }
}

/// Builds an [`EthereumClient`] per selected network.
#[derive(Debug, Clone, Default)]
pub struct EthereumClientFactory {
    tx_config: TransactionConfig,
}

impl EthereumClientFactory {
    /// With `verify_chain_id` set, `connect` queries the node's chain id and
    /// refuses a mismatch.
    pub fn new(tx_config: TransactionConfig) -> Self {
        Self { tx_config }
    }
}

#[async_trait]
impl ClientFactory for EthereumClientFactory {
    async fn connect(&self, network: &Network) -> Result<Arc<dyn ChainClient>, WalletError> {
        let client = EthereumClient::new(network, &self.tx_config)
            .map_err(|e| WalletError::ConfigError(e.to_string()))?;
        if self.tx_config.verify_chain_id {
            client.verify_chain_id().await?;
        }
        Ok(Arc::new(client))
    }
}
