use std::fmt;

/// Custom error type for wallet operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Wrong password or corrupt keystore. The two are indistinguishable.
    AuthenticationError(String),
    /// Malformed recipient address, amount or parameter.
    ValidationError(String),
    /// Transport failure, timeout or malformed RPC response.
    NetworkError(String),
    /// The node rejected or failed the transaction.
    TransactionError(String),
    /// Persisting or loading the keystore failed.
    StorageError(String),
    /// Encryption/decryption or signing errors.
    CryptoError(String),
    /// Serialization/deserialization errors.
    SerializationError(String),
    /// Configuration-related errors.
    ConfigError(String),
    /// Operation not allowed in the current state.
    InvalidState(String),
    /// Resource not found errors.
    NotFoundError(String),
    /// Internal errors.
    InternalError(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::TransactionError(msg) => write!(f, "Transaction error: {}", msg),
            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::CryptoError(msg) => write!(f, "Crypto error: {}", msg),
            WalletError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            WalletError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            WalletError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            WalletError::NotFoundError(msg) => write!(f, "Not found: {}", msg),
            WalletError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    /// Errors the caller may reasonably retry. Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::NetworkError(_))
    }

    /// Errors detected before any network or cryptographic side effect, shown to the user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, WalletError::AuthenticationError(_) | WalletError::ValidationError(_))
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for WalletError {
    fn from(err: toml::de::Error) -> Self {
        WalletError::ConfigError(err.to_string())
    }
}
