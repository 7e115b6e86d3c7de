use anyhow::Result;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use ethers::utils::secret_key_to_address;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, Secret};
use zeroize::Zeroize;

/// Private key wrapper (32 bytes) with secrecy::Secret for automatic zeroization and display-hiding
pub struct PrivateKey(Secret<[u8; 32]>);

impl PrivateKey {
    pub fn new(k: [u8; 32]) -> Self {
        Self(Secret::new(k))
    }

    /// Generate a fresh secp256k1 key from the OS RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&signing_key.to_bytes());
        let key = Self::new(bytes);
        bytes.zeroize();
        key
    }

    /// Scoped access to the underlying secret bytes. Callers can't hold on to or clone
    /// secret data outside the closure.
    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Try to construct a PrivateKey from a byte slice. Must be 32 bytes and a valid
    /// non-zero scalar below the curve order.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 32 {
            return Err(anyhow::anyhow!("Private key must be 32 bytes"));
        }
        SigningKey::from_slice(slice).map_err(|_| anyhow::anyhow!("Invalid secp256k1 private key"))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(slice);
        let key = PrivateKey::new(arr);
        arr.zeroize();
        Ok(key)
    }

    /// Address of this key: last 20 bytes of keccak256 over the uncompressed public key.
    pub fn address(&self) -> Result<Address> {
        self.with_secret(|bytes| {
            let signing_key = SigningKey::from_slice(bytes)
                .map_err(|_| anyhow::anyhow!("Invalid secp256k1 private key"))?;
            Ok(secret_key_to_address(&signing_key))
        })
    }

    /// Signer bound to `chain_id`. The signer lives only as long as the caller keeps it.
    pub(crate) fn signer(&self, chain_id: u64) -> Result<LocalWallet> {
        self.with_secret(|bytes| {
            LocalWallet::from_bytes(bytes)
                .map(|w| w.with_chain_id(chain_id))
                .map_err(|e| anyhow::anyhow!("Invalid private key: {}", e))
        })
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        // overwrite the inner secret by replacing with a zeroed array
        self.0 = Secret::new([0u8; 32]);
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// 0x-prefixed EIP-55 checksummed form.
pub fn checksum_address(address: &Address) -> String {
    ethers::utils::to_checksum(address, None)
}
