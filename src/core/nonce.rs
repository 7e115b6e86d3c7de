//! Nonce 管理模块
//!
//! Per-account nonce tracking. Signing for one account on one chain is
//! serialized through an async lock, so two sends from the same account can
//! never be handed the same nonce.

use ethers::types::{Address, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::blockchain::traits::ChainClient;
use crate::core::errors::WalletError;

type Slot = Arc<AsyncMutex<Option<U256>>>;

#[derive(Debug, Default)]
pub struct NonceManager {
    // (chain id, address) -> next locally known nonce
    slots: Mutex<HashMap<(u64, Address), Slot>>,
}

/// Exclusive claim on the next nonce of one account. Other signers for the same
/// account wait until this is committed or dropped.
#[derive(Debug)]
pub struct NonceReservation {
    guard: OwnedMutexGuard<Option<U256>>,
    nonce: U256,
}

impl NonceReservation {
    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    /// Mark the nonce as used. Dropping without commit leaves it available.
    pub fn commit(mut self) -> Result<(), WalletError> {
        let next = self
            .nonce
            .checked_add(U256::one())
            .ok_or_else(|| WalletError::ValidationError("Nonce overflow".into()))?;
        *self.guard = Some(next);
        Ok(())
    }
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, chain_id: u64, address: Address) -> Slot {
        self.slots.lock().entry((chain_id, address)).or_default().clone()
    }

    /// Lock the account and pick max(chain pending count, local next nonce).
    pub async fn reserve(
        &self,
        client: &dyn ChainClient,
        address: Address,
    ) -> Result<NonceReservation, WalletError> {
        let chain_id = client.network().chain_id;
        let guard = self.slot(chain_id, address).lock_owned().await;

        let on_chain = client.get_transaction_count(&address).await?;
        let nonce = match *guard {
            Some(local) if local > on_chain => local,
            _ => on_chain,
        };
        debug!(address = ?address, chain_id, %nonce, %on_chain, "Reserved nonce");
        Ok(NonceReservation { guard, nonce })
    }

    /// Forget the local counter so the next reservation trusts the chain again.
    pub async fn reset(&self, chain_id: u64, address: Address) {
        info!(address = ?address, chain_id, "Resetting nonce");
        let slot = self.slot(chain_id, address);
        *slot.lock().await = None;
    }

    /// Next nonce known locally, if any.
    pub async fn local_next(&self, chain_id: u64, address: Address) -> Option<U256> {
        *self.slot(chain_id, address).lock().await
    }
}
