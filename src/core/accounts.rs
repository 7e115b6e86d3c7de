//! Account listing with balance resolution.

use chrono::{DateTime, Utc};
use ethers::types::U256;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::blockchain::traits::ChainClient;
use crate::core::domain::checksum_address;
use crate::core::wallet::{Account, Wallet};

/// Display view of one account. Carries no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub index: usize,
    pub address: String,
    /// Display units, or `"unknown"` when the last lookup failed.
    pub balance: String,
    #[serde(skip)]
    pub atomic: Option<U256>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl AccountSummary {
    pub fn from_account(index: usize, account: &Account) -> Self {
        let cache = account.balance();
        Self {
            index,
            address: checksum_address(&account.address()),
            balance: cache.display().to_string(),
            atomic: cache.atomic(),
            refreshed_at: cache.refreshed_at,
        }
    }

    pub fn is_known(&self) -> bool {
        self.atomic.is_some()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AccountRegistry;

impl AccountRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Lazily resolve balances in wallet order. Each item is produced after its
    /// lookup; a failed lookup marks that account unknown and the stream goes on.
    pub fn list_accounts<'a>(
        &self,
        wallet: &'a mut Wallet,
        client: &'a dyn ChainClient,
    ) -> BoxStream<'a, AccountSummary> {
        let decimals = client.network().decimals;
        stream::iter(wallet.accounts_mut().iter_mut().enumerate())
            .then(move |(index, account)| async move {
                let address = account.address();
                match client.get_balance(&address).await {
                    Ok(atomic) => {
                        account.balance_mut().record(atomic, decimals);
                        debug!(index, address = ?address, balance = %account.balance().display(), "Balance refreshed");
                    }
                    Err(e) => {
                        warn!(index, address = ?address, "Balance lookup failed: {}", e);
                        account.balance_mut().mark_unknown();
                    }
                }
                AccountSummary::from_account(index, account)
            })
            .boxed()
    }

    /// Resolve every balance and collect the results.
    pub async fn refresh_all(&self, wallet: &mut Wallet, client: &dyn ChainClient) -> Vec<AccountSummary> {
        self.list_accounts(wallet, client).collect().await
    }

    /// Cached view without touching the network.
    pub fn cached(&self, wallet: &Wallet) -> Vec<AccountSummary> {
        wallet
            .accounts()
            .iter()
            .enumerate()
            .map(|(index, account)| AccountSummary::from_account(index, account))
            .collect()
    }
}
