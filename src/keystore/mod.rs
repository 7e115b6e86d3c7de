//! Password-encrypted key storage.
//!
//! The persisted record is a JSON array of secret-storage v3 entries, one per
//! account, stored under [`KEYSTORE_STORAGE_KEY`]. Each entry encrypts one
//! private key with aes-128-ctr under a scrypt (or pbkdf2) derived key and
//! carries `keccak256(dk[16..32] || ciphertext)` as its MAC.

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::core::config::{KeystoreConfig, ScryptConfig};
use crate::core::domain::PrivateKey;
use crate::core::errors::WalletError;
use crate::core::wallet::Wallet;
use crate::crypto::cipher::{self, CIPHER_NAME};
use crate::crypto::kdf::KdfParams;
use crate::storage::{FileKeystoreStorage, KeystoreStorage};

/// Fixed storage key: one keystore per device.
pub const KEYSTORE_STORAGE_KEY: &str = "crypto_wallet_keystore";
pub const KEYSTORE_VERSION: u32 = 3;

const INVALID_PASSWORD: &str = "Invalid password or corrupted keystore";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    #[serde(with = "hex")]
    pub iv: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub cipherparams: CipherParams,
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    pub kdf: String,
    pub kdfparams: serde_json::Value,
    #[serde(with = "hex")]
    pub mac: Vec<u8>,
}

impl CryptoSection {
    pub fn kdf_params(&self) -> Result<KdfParams, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "kdf": self.kdf,
            "kdfparams": self.kdfparams,
        }))
    }
}

/// One encrypted key in secret-storage v3 layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeystoreBlob {
    pub version: u32,
    pub id: Uuid,
    /// Lowercase hex address without 0x. Optional in the format, checked when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
}

/// Everything persisted under the storage key.
pub type KeystoreRecord = Vec<EncryptedKeystoreBlob>;

impl EncryptedKeystoreBlob {
    /// Encrypt `key` under `password` with fresh salt and IV.
    pub fn encrypt(key: &PrivateKey, password: &str, scrypt: &ScryptConfig) -> Result<Self, WalletError> {
        let kdf = KdfParams::new_scrypt(scrypt);
        let derived = kdf
            .derive_key(password.as_bytes())
            .map_err(|e| WalletError::CryptoError(format!("Key derivation failed: {}", e)))?;

        let iv = cipher::generate_iv();
        // Encrypted in place, so the plaintext copy never outlives this call.
        let mut ciphertext = key.with_secret(|bytes| bytes.to_vec());
        cipher::apply_keystream(&derived, &iv, &mut ciphertext)
            .map_err(|e| WalletError::CryptoError(e.to_string()))?;
        let mac = cipher::compute_mac(&derived, &ciphertext);

        let address = key
            .address()
            .map_err(|e| WalletError::CryptoError(format!("Failed to derive address: {}", e)))?;

        let mut kdf_value = serde_json::to_value(&kdf)?;
        let kdfparams = kdf_value
            .get_mut("kdfparams")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);

        Ok(Self {
            version: KEYSTORE_VERSION,
            id: Uuid::new_v4(),
            address: Some(hex::encode(address.as_bytes())),
            crypto: CryptoSection {
                cipher: CIPHER_NAME.to_string(),
                cipherparams: CipherParams { iv: iv.to_vec() },
                ciphertext,
                kdf: kdf.name().to_string(),
                kdfparams,
                mac: mac.to_vec(),
            },
        })
    }

    /// Re-derive the key from `password`, check the MAC and decrypt.
    /// Every failure is an `AuthenticationError`: a wrong password and a corrupt entry look the same.
    pub fn decrypt(&self, password: &str) -> Result<PrivateKey, WalletError> {
        let auth = |msg: &str| WalletError::AuthenticationError(msg.to_string());

        if self.version != KEYSTORE_VERSION {
            return Err(auth(&format!("Unsupported keystore version {}", self.version)));
        }
        if self.crypto.cipher != CIPHER_NAME {
            return Err(auth(&format!("Unsupported cipher '{}'", self.crypto.cipher)));
        }
        let kdf = self.crypto.kdf_params().map_err(|e| {
            debug!("Malformed kdfparams: {}", e);
            auth("Malformed keystore KDF parameters")
        })?;
        let derived = kdf.derive_key(password.as_bytes()).map_err(|e| {
            debug!("Key derivation rejected: {}", e);
            auth("Malformed keystore KDF parameters")
        })?;

        if !cipher::verify_mac(&derived, &self.crypto.ciphertext, &self.crypto.mac) {
            return Err(auth(INVALID_PASSWORD));
        }

        let mut plain = Zeroizing::new(self.crypto.ciphertext.clone());
        cipher::apply_keystream(&derived, &self.crypto.cipherparams.iv, &mut plain)
            .map_err(|_| auth("Malformed keystore cipher parameters"))?;
        let key = PrivateKey::try_from_slice(&plain).map_err(|_| auth(INVALID_PASSWORD))?;

        if let Some(stored) = &self.address {
            let expected = parse_stored_address(stored).ok_or_else(|| auth("Malformed keystore address"))?;
            let actual = key.address().map_err(|_| auth(INVALID_PASSWORD))?;
            if expected != actual {
                return Err(auth("Keystore address does not match decrypted key"));
            }
        }
        Ok(key)
    }
}

fn parse_stored_address(stored: &str) -> Option<Address> {
    let raw = stored.strip_prefix("0x").unwrap_or(stored);
    let bytes = hex::decode(raw).ok()?;
    (bytes.len() == 20).then(|| Address::from_slice(&bytes))
}

/// Creates and unlocks the device's single keystore.
#[derive(Clone)]
pub struct KeyStore {
    storage: Arc<dyn KeystoreStorage>,
    scrypt: ScryptConfig,
}

impl KeyStore {
    pub fn new(storage: Arc<dyn KeystoreStorage>, scrypt: ScryptConfig) -> Self {
        Self { storage, scrypt }
    }

    /// File-backed keystore in the configured directory.
    pub fn from_config(config: &KeystoreConfig) -> Self {
        Self::new(Arc::new(FileKeystoreStorage::new(config.path.clone())), config.scrypt.clone())
    }

    /// Whether a keystore has been persisted, i.e. whether to offer unlock rather than create.
    pub fn exists(&self) -> Result<bool, WalletError> {
        Ok(self.load_raw()?.is_some())
    }

    /// Generate one fresh key, encrypt it under `password` and persist it, replacing any
    /// existing keystore.
    pub fn create(&self, password: &str) -> Result<(Wallet, KeystoreRecord), WalletError> {
        self.create_with_accounts(password, 1)
    }

    pub fn create_with_accounts(
        &self,
        password: &str,
        count: usize,
    ) -> Result<(Wallet, KeystoreRecord), WalletError> {
        if password.is_empty() {
            return Err(WalletError::ValidationError("Password must not be empty".into()));
        }
        if count == 0 {
            return Err(WalletError::ValidationError("At least one account is required".into()));
        }
        info!("Creating keystore with {} account(s)", count);

        let keys: Vec<PrivateKey> = (0..count).map(|_| PrivateKey::generate()).collect();
        let record = keys
            .iter()
            .map(|key| EncryptedKeystoreBlob::encrypt(key, password, &self.scrypt))
            .collect::<Result<KeystoreRecord, _>>()?;
        let wallet = Wallet::from_keys(keys)?;

        let serialized = serde_json::to_string(&record)?;
        self.storage
            .store(KEYSTORE_STORAGE_KEY, &serialized)
            .map_err(|e| WalletError::StorageError(e.to_string()))?;

        info!(accounts = wallet.len(), "Keystore created");
        Ok((wallet, record))
    }

    /// Load the persisted keystore and decrypt every account with `password`.
    pub fn unlock(&self, password: &str) -> Result<Wallet, WalletError> {
        let raw = self
            .load_raw()?
            .ok_or_else(|| WalletError::AuthenticationError("No keystore found".into()))?;
        let record: KeystoreRecord = serde_json::from_str(&raw).map_err(|e| {
            warn!("Persisted keystore is malformed: {}", e);
            WalletError::AuthenticationError("Malformed keystore".into())
        })?;
        Self::unlock_record(&record, password)
    }

    /// Decrypt an in-memory record without touching storage.
    pub fn unlock_record(record: &[EncryptedKeystoreBlob], password: &str) -> Result<Wallet, WalletError> {
        if record.is_empty() {
            return Err(WalletError::AuthenticationError("Keystore holds no accounts".into()));
        }
        let keys = record
            .iter()
            .map(|blob| blob.decrypt(password))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                warn!("Keystore unlock failed");
                e
            })?;
        let wallet = Wallet::from_keys(keys)?;
        info!(accounts = wallet.len(), "Keystore unlocked");
        Ok(wallet)
    }

    /// `create_with_accounts` on the blocking pool; the KDF is far too slow for an async worker.
    pub async fn create_blocking_task(
        &self,
        password: Zeroizing<String>,
        count: usize,
    ) -> Result<(Wallet, KeystoreRecord), WalletError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.create_with_accounts(&password, count))
            .await
            .map_err(|e| WalletError::InternalError(format!("Keystore task failed: {}", e)))?
    }

    /// `unlock` on the blocking pool.
    pub async fn unlock_blocking_task(&self, password: Zeroizing<String>) -> Result<Wallet, WalletError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.unlock(&password))
            .await
            .map_err(|e| WalletError::InternalError(format!("Keystore task failed: {}", e)))?
    }

    fn load_raw(&self) -> Result<Option<String>, WalletError> {
        self.storage
            .load(KEYSTORE_STORAGE_KEY)
            .map_err(|e| WalletError::StorageError(e.to_string()))
    }
}
