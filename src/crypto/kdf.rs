use anyhow::Result;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::config::ScryptConfig;

/// Upper bound accepted when reading a keystore, so a crafted file can't demand gigabytes.
const MAX_SCRYPT_LOG_N: u32 = 20;
/// scrypt's working set is 128 * r * N bytes; 256 MiB covers the standard N=2^18, r=8.
const MAX_SCRYPT_MEMORY: u64 = 256 * 1024 * 1024;
const MAX_SCRYPT_P: u32 = 16;
const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    pub dklen: u32,
    pub n: u32,
    pub p: u32,
    pub r: u32,
    #[serde(with = "hex")]
    pub salt: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    pub c: u32,
    pub dklen: u32,
    pub prf: String,
    #[serde(with = "hex")]
    pub salt: Vec<u8>,
}

/// KDF name and parameters as they appear in a secret-storage keystore
/// (`"kdf": "scrypt", "kdfparams": {...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kdf", content = "kdfparams", rename_all = "lowercase")]
pub enum KdfParams {
    Scrypt(ScryptParams),
    Pbkdf2(Pbkdf2Params),
}

impl KdfParams {
    /// Fresh scrypt parameters with a random 32-byte salt.
    pub fn new_scrypt(config: &ScryptConfig) -> Self {
        KdfParams::Scrypt(ScryptParams {
            dklen: config.dklen,
            n: config.n,
            p: config.p,
            r: config.r,
            salt: generate_salt(32),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            KdfParams::Scrypt(_) => "scrypt",
            KdfParams::Pbkdf2(_) => "pbkdf2",
        }
    }

    pub fn dklen(&self) -> usize {
        match self {
            KdfParams::Scrypt(p) => p.dklen as usize,
            KdfParams::Pbkdf2(p) => p.dklen as usize,
        }
    }

    /// Derive key material from `password`. Deliberately slow.
    pub fn derive_key(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let dklen = self.dklen();
        if !(32..=64).contains(&dklen) {
            return Err(anyhow::anyhow!("Unsupported derived key length {}", dklen));
        }
        match self {
            KdfParams::Scrypt(p) => derive_scrypt(password, &p.salt, p.n, p.r, p.p, dklen),
            KdfParams::Pbkdf2(p) => {
                if p.prf != "hmac-sha256" {
                    return Err(anyhow::anyhow!("Unsupported PBKDF2 PRF '{}'", p.prf));
                }
                derive_pbkdf2(password, &p.salt, p.c, dklen)
            }
        }
    }
}

/// Check scrypt cost parameters against the bounds this wallet will run, and
/// return log2(N).
pub fn check_scrypt_params(n: u32, r: u32, p: u32) -> Result<u8> {
    if n < 2 || !n.is_power_of_two() {
        return Err(anyhow::anyhow!("Scrypt N must be a power of two > 1"));
    }
    let log_n = n.trailing_zeros();
    if log_n > MAX_SCRYPT_LOG_N {
        return Err(anyhow::anyhow!("Scrypt N={} exceeds the supported work factor", n));
    }
    if r == 0 || p == 0 || p > MAX_SCRYPT_P {
        return Err(anyhow::anyhow!("Unsupported Scrypt parameters r={}, p={}", r, p));
    }
    if u64::from(r) * u64::from(p) >= 1 << 30 {
        return Err(anyhow::anyhow!("Scrypt r*p must be below 2^30"));
    }
    let memory = 128 * u64::from(r) * u64::from(n);
    if memory > MAX_SCRYPT_MEMORY {
        return Err(anyhow::anyhow!("Scrypt parameters need {} bytes of memory", memory));
    }
    Ok(log_n as u8)
}

fn derive_scrypt(
    password: &[u8],
    salt: &[u8],
    n: u32,
    r: u32,
    p: u32,
    key_length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    debug!("Using Scrypt with parameters N={}, r={}, p={}", n, r, p);

    let log_n = check_scrypt_params(n, r, p)?;
    let params = scrypt::Params::new(log_n, r, p, key_length)
        .map_err(|e| anyhow::anyhow!("Invalid Scrypt parameters: {}", e))?;

    let mut key = Zeroizing::new(vec![0u8; key_length]);
    scrypt::scrypt(password, salt, &params, &mut key)
        .map_err(|e| anyhow::anyhow!("Scrypt derivation failed: {}", e))?;

    debug!("Scrypt key derived");
    Ok(key)
}

fn derive_pbkdf2(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    debug!("Using PBKDF2 with {} iterations", iterations);
    if iterations == 0 || iterations > MAX_PBKDF2_ITERATIONS {
        return Err(anyhow::anyhow!("Unsupported PBKDF2 iteration count {}", iterations));
    }

    let mut key = Zeroizing::new(vec![0u8; key_length]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);

    debug!("PBKDF2 key derived");
    Ok(key)
}

pub fn generate_salt(length: usize) -> Vec<u8> {
    let mut salt = vec![0u8; length];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
