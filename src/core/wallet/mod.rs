//! In-memory wallet: the accounts of an unlocked keystore.
//!
//! A `Wallet` only exists between unlock/create and logout. Private keys never
//! leave `Account`; the rest of the crate sees addresses and balance snapshots.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use std::collections::HashSet;
use tracing::debug;
use zeroize::Zeroize;

use crate::core::domain::{checksum_address, PrivateKey};
use crate::core::errors::WalletError;
use crate::core::units;

/// Display value for a balance that could not be fetched.
pub const UNKNOWN_BALANCE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Balance {
    #[default]
    Unknown,
    Known { atomic: U256, display: String },
}

/// Last fetched balance of an account. A snapshot, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceCache {
    pub balance: Balance,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl BalanceCache {
    pub fn atomic(&self) -> Option<U256> {
        match &self.balance {
            Balance::Known { atomic, .. } => Some(*atomic),
            Balance::Unknown => None,
        }
    }

    pub fn display(&self) -> &str {
        match &self.balance {
            Balance::Known { display, .. } => display,
            Balance::Unknown => UNKNOWN_BALANCE,
        }
    }

    pub(crate) fn record(&mut self, atomic: U256, decimals: u32) {
        self.balance = Balance::Known { atomic, display: units::to_display(atomic, decimals) };
        self.refreshed_at = Some(Utc::now());
    }

    pub(crate) fn mark_unknown(&mut self) {
        self.balance = Balance::Unknown;
        self.refreshed_at = Some(Utc::now());
    }
}

#[derive(Debug)]
pub struct Account {
    address: Address,
    private_key: PrivateKey,
    balance: BalanceCache,
}

impl Account {
    pub(crate) fn from_private_key(private_key: PrivateKey) -> Result<Self, WalletError> {
        let address = private_key
            .address()
            .map_err(|e| WalletError::CryptoError(format!("Failed to derive address: {}", e)))?;
        Ok(Self { address, private_key, balance: BalanceCache::default() })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-55 checksummed address.
    pub fn address_string(&self) -> String {
        checksum_address(&self.address)
    }

    pub fn balance(&self) -> &BalanceCache {
        &self.balance
    }

    pub(crate) fn balance_mut(&mut self) -> &mut BalanceCache {
        &mut self.balance
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

impl Zeroize for Account {
    fn zeroize(&mut self) {
        self.private_key.zeroize();
        self.balance = BalanceCache::default();
    }
}

/// Accounts of one unlocked keystore, in keystore order.
#[derive(Debug, Default)]
pub struct Wallet {
    accounts: Vec<Account>,
}

impl Wallet {
    /// Build a wallet from decrypted keys. Two keys with the same address are rejected.
    pub(crate) fn from_keys(keys: Vec<PrivateKey>) -> Result<Self, WalletError> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut accounts = Vec::with_capacity(keys.len());
        for key in keys {
            let account = Account::from_private_key(key)?;
            if !seen.insert(account.address) {
                return Err(WalletError::AuthenticationError(format!(
                    "Duplicate account {} in keystore",
                    account.address_string()
                )));
            }
            accounts.push(account);
        }
        Ok(Self { accounts })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub(crate) fn accounts_mut(&mut self) -> &mut [Account] {
        &mut self.accounts
    }

    pub fn account(&self, index: usize) -> Option<&Account> {
        self.accounts.get(index)
    }

    pub fn find(&self, address: &Address) -> Option<&Account> {
        self.accounts.iter().find(|a| &a.address == address)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address).collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Zero every private key and drop the accounts.
    pub fn lock(&mut self) {
        debug!(accounts = self.accounts.len(), "Locking wallet");
        for account in self.accounts.iter_mut() {
            account.zeroize();
        }
        self.accounts.clear();
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        self.lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PrivateKey {
        PrivateKey::try_from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn wallet_keeps_keystore_order() {
        let expected = vec![key(1).address().unwrap(), key(2).address().unwrap()];
        let wallet = Wallet::from_keys(vec![key(1), key(2)]).unwrap();
        assert_eq!(wallet.addresses(), expected);
        assert_eq!(wallet.account(1).unwrap().address(), expected[1]);
        assert!(wallet.find(&expected[0]).is_some());
    }

    #[test]
    fn duplicate_addresses_rejected() {
        let err = Wallet::from_keys(vec![key(3), key(3)]).unwrap_err();
        assert!(matches!(err, WalletError::AuthenticationError(_)));
    }

    #[test]
    fn balance_starts_unknown() {
        let wallet = Wallet::from_keys(vec![key(4)]).unwrap();
        let cache = wallet.accounts()[0].balance();
        assert_eq!(cache.display(), UNKNOWN_BALANCE);
        assert!(cache.refreshed_at.is_none());
    }

    #[test]
    fn record_formats_display_units() {
        let mut cache = BalanceCache::default();
        cache.record(U256::from_dec_str("2500000000000000000").unwrap(), 18);
        assert_eq!(cache.display(), "2.5");
        assert!(cache.refreshed_at.is_some());
        cache.mark_unknown();
        assert_eq!(cache.display(), UNKNOWN_BALANCE);
        assert_eq!(cache.atomic(), None);
    }

    #[test]
    fn lock_zeroizes_and_clears() {
        let mut wallet = Wallet::from_keys(vec![key(5)]).unwrap();
        wallet.accounts_mut()[0].zeroize();
        wallet.accounts()[0].private_key().with_secret(|b| assert_eq!(b, &[0u8; 32]));
        wallet.lock();
        assert!(wallet.is_empty());
    }
}
