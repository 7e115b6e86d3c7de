use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;

use crate::blockchain::events::TransactionHandle;
use crate::core::config::{FeeMode, Network};
use crate::core::errors::WalletError;
use crate::core::transaction::FeeParams;

/// Defines the interface to a remote chain node for one network.
///
/// Methods suspend only for the RPC round-trip and never retry; retry policy
/// belongs to the caller.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The network this client is bound to.
    fn network(&self) -> &Network;

    /// Balance of `address` in atomic units.
    async fn get_balance(&self, address: &Address) -> Result<U256, WalletError>;

    /// Next nonce for `address`, counting pending transactions.
    async fn get_transaction_count(&self, address: &Address) -> Result<U256, WalletError>;

    /// Current fee suggestion in the requested mode.
    async fn suggest_fees(&self, mode: FeeMode) -> Result<FeeParams, WalletError>;

    /// Submit raw signed transaction bytes. Node rejection is reported through the
    /// handle's `Error` event, not through the returned `Result`.
    async fn send_signed_transaction(&self, raw: Bytes) -> Result<TransactionHandle, WalletError>;
}

/// Builds the client for a network when it becomes active.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, network: &Network) -> Result<Arc<dyn ChainClient>, WalletError>;
}
