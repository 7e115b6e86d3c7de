// tests/util.rs
// Shared test helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use crypto_wallet::blockchain::events::{self, EventSender, TransactionHandle};
use crypto_wallet::blockchain::traits::{ChainClient, ClientFactory};
use crypto_wallet::core::config::{FeeMode, Network, ScryptConfig};
use crypto_wallet::core::errors::WalletError;
use crypto_wallet::core::transaction::FeeParams;
use crypto_wallet::keystore::KeyStore;
use crypto_wallet::storage::MemoryKeystoreStorage;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use ethers::utils::keccak256;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Cheap scrypt settings so tests stay fast.
pub fn light_scrypt() -> ScryptConfig {
    ScryptConfig { n: 1024, r: 8, p: 1, dklen: 32 }
}

pub fn memory_keystore() -> KeyStore {
    KeyStore::new(Arc::new(MemoryKeystoreStorage::new()), light_scrypt())
}

pub fn local_network(name: &str, chain_id: u64) -> Network {
    Network::new(name, "http://127.0.0.1:8545", "https://explorer.local", chain_id)
}

/// What the stub node does with the next submitted transaction.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// hash, then a successful receipt
    Confirm,
    /// error without a hash
    Reject(WalletError),
    /// hash, then an error
    Revert,
    /// hash only; the handle stays open
    Pending,
}

/// In-process chain node with scripted balances and send outcomes.
pub struct StubChain {
    network: Network,
    balances: Mutex<HashMap<Address, U256>>,
    nonces: Mutex<HashMap<Address, U256>>,
    outcomes: Mutex<VecDeque<SendOutcome>>,
    held: Mutex<Vec<EventSender>>,
    pub sent: Mutex<Vec<Bytes>>,
    pub balance_calls: Mutex<usize>,
}

impl StubChain {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            balances: Mutex::new(HashMap::new()),
            nonces: Mutex::new(HashMap::new()),
            outcomes: Mutex::new(VecDeque::new()),
            held: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            balance_calls: Mutex::new(0),
        }
    }

    /// Addresses without a balance fail their lookup.
    pub fn set_balance(&self, address: Address, atomic: U256) {
        self.balances.lock().insert(address, atomic);
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.lock().insert(address, U256::from(nonce));
    }

    pub fn push_outcome(&self, outcome: SendOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl ChainClient for StubChain {
    fn network(&self) -> &Network {
        &self.network
    }

    async fn get_balance(&self, address: &Address) -> Result<U256, WalletError> {
        *self.balance_calls.lock() += 1;
        self.balances
            .lock()
            .get(address)
            .copied()
            .ok_or_else(|| WalletError::NetworkError("request timed out".into()))
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<U256, WalletError> {
        Ok(self.nonces.lock().get(address).copied().unwrap_or_default())
    }

    async fn suggest_fees(&self, mode: FeeMode) -> Result<FeeParams, WalletError> {
        let gwei = U256::from(1_000_000_000u64);
        Ok(match mode {
            FeeMode::Legacy => FeeParams::Legacy { gas_price: gwei * U256::from(20u64) },
            FeeMode::Eip1559 => FeeParams::Eip1559 {
                max_fee_per_gas: gwei * U256::from(40u64),
                max_priority_fee_per_gas: gwei * U256::from(2u64),
            },
        })
    }

    async fn send_signed_transaction(&self, raw: Bytes) -> Result<TransactionHandle, WalletError> {
        let hash = H256::from(keccak256(&raw));
        self.sent.lock().push(raw);
        let outcome = self.outcomes.lock().pop_front().unwrap_or(SendOutcome::Confirm);

        let (mut sender, handle) = events::channel(&self.network.name);
        match outcome {
            SendOutcome::Confirm => {
                sender.hash(hash);
                sender.receipt(TransactionReceipt {
                    transaction_hash: hash,
                    block_number: Some(U64::from(1)),
                    status: Some(U64::from(1)),
                    ..Default::default()
                });
            }
            SendOutcome::Reject(error) => {
                sender.error(error);
            }
            SendOutcome::Revert => {
                sender.hash(hash);
                sender.error(WalletError::TransactionError("execution reverted".into()));
            }
            SendOutcome::Pending => {
                sender.hash(hash);
                self.held.lock().push(sender);
            }
        }
        Ok(handle)
    }
}

/// Hands out pre-built stub chains by network name.
#[derive(Default)]
pub struct StubFactory {
    chains: Mutex<HashMap<String, Arc<StubChain>>>,
    pub connects: Mutex<Vec<String>>,
}

impl StubFactory {
    pub fn with_chain(self, chain: Arc<StubChain>) -> Self {
        self.chains.lock().insert(chain.network().name.clone(), chain);
        self
    }

    pub fn chain(&self, name: &str) -> Arc<StubChain> {
        self.chains.lock().get(name).cloned().expect("chain registered")
    }
}

#[async_trait]
impl ClientFactory for StubFactory {
    async fn connect(&self, network: &Network) -> Result<Arc<dyn ChainClient>, WalletError> {
        self.connects.lock().push(network.name.clone());
        let chain = self
            .chains
            .lock()
            .get(&network.name)
            .cloned()
            .ok_or_else(|| WalletError::NetworkError(format!("{} unreachable", network.name)))?;
        Ok(chain)
    }
}
