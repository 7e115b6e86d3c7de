use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::errors::WalletError;
use crate::crypto::kdf::check_scrypt_params;

/// Decimal exponent of the native unit on Ethereum-style chains (1 ETH = 10^18 wei).
pub const DEFAULT_DECIMALS: u32 = 18;

/// A blockchain network the wallet can point at.
///
/// Only `rpc_url`, `chain_id` and `decimals` matter to the wallet core; the
/// explorer URL and name are display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(alias = "rpc")]
    pub rpc_url: String,
    pub tx_explorer: String,
    pub chain_id: u64,
    #[serde(default = "Network::default_decimals")]
    pub decimals: u32,
    #[serde(default = "Network::default_native_symbol")]
    pub native_symbol: String,
}

impl Network {
    fn default_decimals() -> u32 { DEFAULT_DECIMALS }
    fn default_native_symbol() -> String { "ETH".to_string() }

    pub fn new(name: &str, rpc_url: &str, tx_explorer: &str, chain_id: u64) -> Self {
        Self {
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            tx_explorer: tx_explorer.to_string(),
            chain_id,
            decimals: DEFAULT_DECIMALS,
            native_symbol: Self::default_native_symbol(),
        }
    }

    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.tx_explorer.trim_end_matches('/'), tx_hash)
    }

    /// Explorer link for an address.
    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.tx_explorer.trim_end_matches('/'), address)
    }
}

/// scrypt work factor used when writing new keystores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptConfig {
    #[serde(default = "ScryptConfig::default_n")]
    pub n: u32,
    #[serde(default = "ScryptConfig::default_r")]
    pub r: u32,
    #[serde(default = "ScryptConfig::default_p")]
    pub p: u32,
    #[serde(default = "ScryptConfig::default_dklen")]
    pub dklen: u32,
}

impl ScryptConfig {
    fn default_n() -> u32 { 262_144 }
    fn default_r() -> u32 { 8 }
    fn default_p() -> u32 { 1 }
    fn default_dklen() -> u32 { 32 }
}

impl Default for ScryptConfig {
    fn default() -> Self {
        Self {
            n: Self::default_n(),
            r: Self::default_r(),
            p: Self::default_p(),
            dklen: Self::default_dklen(),
        }
    }
}

/// Keystore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Directory holding the persisted keystore record
    #[serde(default = "KeystoreConfig::default_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub scrypt: ScryptConfig,
}

impl KeystoreConfig {
    fn default_path() -> PathBuf { PathBuf::from("./data/keystore") }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self { path: Self::default_path(), scrypt: ScryptConfig::default() }
    }
}

/// How transaction fees are expressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeMode {
    #[default]
    Eip1559,
    Legacy,
}

/// Transaction defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "TransactionConfig::default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub fee_mode: FeeMode,
    /// Fixed fee values in wei. Unset values are asked from the node.
    #[serde(default)]
    pub max_fee_per_gas: Option<u64>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<u64>,
    /// Blocks to wait for before a receipt is reported
    #[serde(default = "TransactionConfig::default_confirmations")]
    pub confirmations: usize,
    #[serde(default = "TransactionConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "TransactionConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Compare the node's chain id with the configured one on connect
    #[serde(default)]
    pub verify_chain_id: bool,
}

impl TransactionConfig {
    fn default_gas_limit() -> u64 { 21_000 }
    fn default_confirmations() -> usize { 1 }
    fn default_poll_interval_ms() -> u64 { 4_000 }
    fn default_request_timeout_secs() -> u64 { 10 }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            gas_limit: Self::default_gas_limit(),
            fee_mode: FeeMode::default(),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            gas_price: None,
            confirmations: Self::default_confirmations(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            verify_chain_id: false,
        }
    }
}

/// wallet配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Ordered; the first entry is the network selected at startup.
    #[serde(default = "WalletConfig::default_networks")]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub keystore: KeystoreConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            networks: Self::default_networks(),
            keystore: KeystoreConfig::default(),
            transaction: TransactionConfig::default(),
        }
    }
}

impl WalletConfig {
    fn default_networks() -> Vec<Network> {
        vec![
            Network::new("Sepolia", "https://rpc.sepolia.org", "https://sepolia.etherscan.io", 11155111),
            Network::new(
                "Holesky",
                "https://ethereum-holesky-rpc.publicnode.com",
                "https://holesky.etherscan.io",
                17000,
            ),
            Network::new("Mainnet", "https://eth.llamarpc.com", "https://etherscan.io", 1),
        ]
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, WalletError> {
        let config: WalletConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WalletError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded wallet config from {} ({} networks)", path.display(), config.networks.len());
        Ok(config)
    }

    /// Load from `CONFIG_PATH` (default `config.toml`). A missing file falls back to defaults;
    /// a file that exists but does not parse is an error.
    pub fn load_from_env() -> Result<Self, WalletError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        if !Path::new(&config_path).exists() {
            warn!("Config file {} not found. Using default configuration", config_path);
            return Ok(Self::default());
        }
        Self::load(&config_path)
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.networks.is_empty() {
            return Err(WalletError::ConfigError("At least one network must be configured".into()));
        }
        let mut seen = HashSet::with_capacity(self.networks.len());
        for network in &self.networks {
            if !seen.insert(network.name.as_str()) {
                return Err(WalletError::ConfigError(format!(
                    "Duplicate network name '{}'",
                    network.name
                )));
            }
            reqwest::Url::parse(network.rpc_url.trim()).map_err(|e| {
                WalletError::ConfigError(format!(
                    "Invalid RPC URL '{}' for network {}: {}",
                    network.rpc_url, network.name, e
                ))
            })?;
            if network.decimals > 77 {
                // 10^78 overflows U256
                return Err(WalletError::ConfigError(format!(
                    "Unsupported decimals {} for network {}",
                    network.decimals, network.name
                )));
            }
        }

        let scrypt = &self.keystore.scrypt;
        check_scrypt_params(scrypt.n, scrypt.r, scrypt.p)
            .map_err(|e| WalletError::ConfigError(format!("keystore.scrypt: {}", e)))?;
        if scrypt.dklen < 32 {
            return Err(WalletError::ConfigError("scrypt dklen must be at least 32".into()));
        }
        if self.transaction.gas_limit == 0 {
            return Err(WalletError::ConfigError("gas_limit must be positive".into()));
        }
        Ok(())
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name.eq_ignore_ascii_case(name))
    }

    pub fn default_network(&self) -> Result<&Network, WalletError> {
        self.networks
            .first()
            .ok_or_else(|| WalletError::ConfigError("No networks configured".into()))
    }
}
