//! aes-128-ctr keystore cipher and its keccak256 MAC.

use aes::cipher::{KeyIvInit, StreamCipher};
use anyhow::Result;
use rand::RngCore;
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

pub const CIPHER_NAME: &str = "aes-128-ctr";

/// Encrypt or decrypt `data` in place; CTR mode is its own inverse.
/// `derived_key[..16]` is the cipher key.
pub fn apply_keystream(derived_key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    if derived_key.len() < 32 {
        return Err(anyhow::anyhow!("Derived key must be at least 32 bytes"));
    }
    let mut cipher = Aes128Ctr::new_from_slices(&derived_key[..16], iv)
        .map_err(|_| anyhow::anyhow!("IV must be 16 bytes"))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// keccak256(derived_key[16..32] || ciphertext)
pub fn compute_mac(derived_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(&derived_key[16..32]);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

/// Constant-time comparison of the recomputed MAC against the stored one.
pub fn verify_mac(derived_key: &[u8], ciphertext: &[u8], stored_mac: &[u8]) -> bool {
    let computed = compute_mac(derived_key, ciphertext);
    computed[..].ct_eq(stored_mac).into()
}

pub fn generate_iv() -> [u8; 16] {
    let mut iv = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}
