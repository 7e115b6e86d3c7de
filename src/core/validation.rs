use ethers::types::Address;
use regex::Regex;
use sha3::{Digest, Keccak256};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::core::errors::WalletError;

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Hardcoded regex should always compile"))
}

/// Validates an Ethereum address.
pub fn validate_ethereum_address(address: &str) -> Result<(), WalletError> {
    if !address.starts_with("0x") || address.len() != 42 {
        return Err(WalletError::ValidationError(format!(
            "Invalid Ethereum address format: {}",
            address
        )));
    }
    if !address_regex().is_match(address) {
        return Err(WalletError::ValidationError(format!(
            "Invalid Ethereum address characters: {}",
            address
        )));
    }
    // EIP-55: if mixed-case, enforce checksum. All-lower or all-upper acceptable for compatibility.
    let body = &address[2..];
    let is_all_lower = body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
    let is_all_upper = body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(());
    }
    if !is_eip55_checksum_valid(address) {
        return Err(WalletError::ValidationError(format!(
            "Invalid EIP-55 checksum for Ethereum address: {}",
            address
        )));
    }
    Ok(())
}

/// Validate and parse a recipient address.
pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    let address = address.trim();
    validate_ethereum_address(address)?;
    Address::from_str(address)
        .map_err(|e| WalletError::ValidationError(format!("Invalid Ethereum address: {}", e)))
}

fn is_eip55_checksum_valid(addr: &str) -> bool {
    if addr.len() != 42 || !addr.starts_with("0x") {
        return false;
    }
    let body = &addr[2..];
    let lower = body.to_lowercase();
    let mut keccak = Keccak256::new();
    keccak.update(lower.as_bytes());
    let hash = keccak.finalize();
    for (i, ch) in body.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' => {
                if nibble >= 8 {
                    return false;
                }
            }
            'A'..='F' => {
                if nibble < 8 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_checksummed_and_single_case() {
        // EIP-55 reference vectors
        validate_ethereum_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        validate_ethereum_address("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359").unwrap();
        validate_ethereum_address("0x742d35cc6634c0532925a3b844bc454e4438f44e").unwrap();
        validate_ethereum_address("0x742D35CC6634C0532925A3B844BC454E4438F44E").unwrap();
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = validate_ethereum_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD").unwrap_err();
        assert!(matches!(err, WalletError::ValidationError(_)));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["not-an-address", "", "0x12345", "742d35cc6634c0532925a3b844bc454e4438f44e", "0xZZ2d35cc6634c0532925a3b844bc454e4438f44e"] {
            assert!(parse_address(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn parse_returns_address_bytes() {
        let addr = parse_address("0x0000000000000000000000000000000000000001").unwrap();
        assert_eq!(addr, Address::from_low_u64_be(1));
    }
}
