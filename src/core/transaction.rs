//! Transaction lifecycle
//!
//! `Created -> Signed -> Broadcast -> Confirmed | Failed`. `Failed` is also
//! reachable straight from `Signed` when the node rejects the submission.
//! Every other transition is refused with `InvalidState`.

use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Eip1559TransactionRequest,
    NameOrAddress, Signature, TransactionReceipt, TransactionRequest, H256, U256,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::blockchain::events::{self, TransactionHandle, TxEvent};
use crate::blockchain::traits::ChainClient;
use crate::core::config::{FeeMode, TransactionConfig};
use crate::core::errors::WalletError;
use crate::core::nonce::NonceManager;
use crate::core::units;
use crate::core::validation::parse_address;
use crate::core::wallet::Account;

/// Fee fields of a transaction, in atomic units per gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    Eip1559 { max_fee_per_gas: U256, max_priority_fee_per_gas: U256 },
    Legacy { gas_price: U256 },
}

impl FeeParams {
    pub fn mode(&self) -> FeeMode {
        match self {
            FeeParams::Eip1559 { .. } => FeeMode::Eip1559,
            FeeParams::Legacy { .. } => FeeMode::Legacy,
        }
    }

    /// Highest price per gas this transaction can pay.
    pub fn max_price(&self) -> U256 {
        match self {
            FeeParams::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
            FeeParams::Legacy { gas_price } => *gas_price,
        }
    }

    fn validate(&self) -> Result<(), WalletError> {
        if let FeeParams::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } = self {
            if max_priority_fee_per_gas > max_fee_per_gas {
                return Err(WalletError::ValidationError(
                    "max_priority_fee_per_gas exceeds max_fee_per_gas".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Gas limit plus fees. `fees: None` asks the chain client for a suggestion at
/// signing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub gas_limit: U256,
    pub fee_mode: FeeMode,
    pub fees: Option<FeeParams>,
}

impl GasParams {
    pub fn new(gas_limit: u64, fee_mode: FeeMode) -> Self {
        Self { gas_limit: U256::from(gas_limit), fee_mode, fees: None }
    }

    pub fn with_fees(mut self, fees: FeeParams) -> Self {
        self.fee_mode = fees.mode();
        self.fees = Some(fees);
        self
    }

    /// Gas settings from the `[transaction]` config section. Fixed fees are used
    /// only when every field of the chosen mode is set.
    pub fn from_config(config: &TransactionConfig) -> Self {
        let fees = match config.fee_mode {
            FeeMode::Legacy => {
                config.gas_price.map(|p| FeeParams::Legacy { gas_price: U256::from(p) })
            }
            FeeMode::Eip1559 => match (config.max_fee_per_gas, config.max_priority_fee_per_gas) {
                (Some(max), Some(priority)) => Some(FeeParams::Eip1559 {
                    max_fee_per_gas: U256::from(max),
                    max_priority_fee_per_gas: U256::from(priority),
                }),
                _ => None,
            },
        };
        Self { gas_limit: U256::from(config.gas_limit), fee_mode: config.fee_mode, fees }
    }
}

impl Default for GasParams {
    fn default() -> Self {
        Self::from_config(&TransactionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Created,
    Signed,
    Broadcast,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxStatus::Created => "created",
            TxStatus::Signed => "signed",
            TxStatus::Broadcast => "broadcast",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A value transfer moving through its lifecycle.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub gas: GasParams,
    status: TxStatus,
    nonce: Option<U256>,
    chain_id: Option<u64>,
    signature: Option<Signature>,
    raw: Option<Bytes>,
    hash: Option<H256>,
    receipt: Option<Box<TransactionReceipt>>,
    error: Option<WalletError>,
}

impl Transaction {
    fn created(from: Address, to: Address, amount: U256, gas: GasParams) -> Self {
        Self {
            from,
            to,
            amount,
            gas,
            status: TxStatus::Created,
            nonce: None,
            chain_id: None,
            signature: None,
            raw: None,
            hash: None,
            receipt: None,
            error: None,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn nonce(&self) -> Option<U256> {
        self.nonce
    }

    /// Pin the nonce instead of reserving one at signing time.
    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// RLP-encoded signed bytes, present from `Signed` on.
    pub fn raw(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }

    pub fn hash(&self) -> Option<H256> {
        self.hash
    }

    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        self.receipt.as_deref()
    }

    pub fn error(&self) -> Option<&WalletError> {
        self.error.as_ref()
    }

    fn expect_status(&self, expected: TxStatus, action: &str) -> Result<(), WalletError> {
        if self.status != expected {
            return Err(WalletError::InvalidState(format!(
                "Cannot {} a transaction in state {}",
                action, self.status
            )));
        }
        Ok(())
    }

    fn mark_broadcast(&mut self, hash: H256) -> Result<(), WalletError> {
        self.expect_status(TxStatus::Signed, "mark as broadcast")?;
        if let Some(local) = self.hash {
            if local != hash {
                warn!(local = ?local, node = ?hash, "Node reported a different transaction hash");
            }
        }
        self.hash = Some(hash);
        self.status = TxStatus::Broadcast;
        Ok(())
    }

    fn mark_confirmed(&mut self, receipt: Box<TransactionReceipt>) -> Result<(), WalletError> {
        self.expect_status(TxStatus::Broadcast, "confirm")?;
        self.receipt = Some(receipt);
        self.status = TxStatus::Confirmed;
        Ok(())
    }

    fn mark_failed(&mut self, error: WalletError) -> Result<(), WalletError> {
        if !matches!(self.status, TxStatus::Signed | TxStatus::Broadcast) {
            return Err(WalletError::InvalidState(format!(
                "Cannot fail a transaction in state {}",
                self.status
            )));
        }
        self.error = Some(error);
        self.status = TxStatus::Failed;
        Ok(())
    }

    fn typed(&self, nonce: U256, chain_id: u64, fees: FeeParams) -> TypedTransaction {
        match fees {
            FeeParams::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                Eip1559TransactionRequest {
                    from: Some(self.from),
                    to: Some(NameOrAddress::Address(self.to)),
                    value: Some(self.amount),
                    gas: Some(self.gas.gas_limit),
                    nonce: Some(nonce),
                    max_fee_per_gas: Some(max_fee_per_gas),
                    max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
                    chain_id: Some(chain_id.into()),
                    ..Default::default()
                }
                .into()
            }
            FeeParams::Legacy { gas_price } => TransactionRequest::new()
                .from(self.from)
                .to(self.to)
                .value(self.amount)
                .gas(self.gas.gas_limit)
                .gas_price(gas_price)
                .nonce(nonce)
                .chain_id(chain_id)
                .into(),
        }
    }
}

/// Builds, signs and broadcasts transfers. Cloning shares the nonce state.
#[derive(Debug, Clone, Default)]
pub struct TransactionManager {
    nonces: Arc<NonceManager>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nonce_manager(nonces: Arc<NonceManager>) -> Self {
        Self { nonces }
    }

    pub fn nonces(&self) -> &Arc<NonceManager> {
        &self.nonces
    }

    /// Validate inputs and produce a `Created` transaction. `amount` is in display
    /// units of a network with `decimals` decimals. Nothing leaves the process.
    pub fn build(
        &self,
        from: Address,
        to: &str,
        amount: &str,
        decimals: u32,
        gas: GasParams,
    ) -> Result<Transaction, WalletError> {
        let to = parse_address(to)?;
        let amount = units::to_atomic(amount, decimals)?;
        if gas.gas_limit.is_zero() {
            return Err(WalletError::ValidationError("Gas limit must be greater than zero".into()));
        }
        if let Some(fees) = &gas.fees {
            fees.validate()?;
        }
        debug!(from = ?from, to = ?to, %amount, "Transaction built");
        Ok(Transaction::created(from, to, amount, gas))
    }

    /// Sign with `account`'s key. Signing for one account is serialized, and the
    /// nonce is reserved for the duration.
    pub async fn sign(
        &self,
        mut tx: Transaction,
        account: &Account,
        client: &dyn ChainClient,
    ) -> Result<Transaction, WalletError> {
        tx.expect_status(TxStatus::Created, "sign")?;
        if account.address() != tx.from {
            return Err(WalletError::ValidationError(format!(
                "Account {} does not match sender {:?}",
                account.address_string(),
                tx.from
            )));
        }

        let chain_id = client.network().chain_id;
        let (reservation, nonce) = match tx.nonce {
            Some(pinned) => (None, pinned),
            None => {
                let reservation = self.nonces.reserve(client, tx.from).await?;
                let nonce = reservation.nonce();
                (Some(reservation), nonce)
            }
        };

        let fees = match tx.gas.fees {
            Some(fees) => fees,
            None => client.suggest_fees(tx.gas.fee_mode).await?,
        };
        fees.validate()?;

        let typed = tx.typed(nonce, chain_id, fees);
        let signer = account
            .private_key()
            .signer(chain_id)
            .map_err(|e| WalletError::CryptoError(e.to_string()))?;
        let signature = signer
            .sign_transaction_sync(&typed)
            .map_err(|e| WalletError::CryptoError(format!("Failed to sign transaction: {}", e)))?;
        drop(signer);

        let raw = typed.rlp_signed(&signature);
        let hash = typed.hash(&signature);

        if let Some(reservation) = reservation {
            reservation.commit()?;
        }

        tx.nonce = Some(nonce);
        tx.chain_id = Some(chain_id);
        tx.gas.fees = Some(fees);
        tx.signature = Some(signature);
        tx.raw = Some(raw);
        tx.hash = Some(hash);
        tx.status = TxStatus::Signed;
        info!(hash = ?hash, %nonce, chain_id, "Transaction signed");
        Ok(tx)
    }

    /// Submit a `Signed` transaction. The returned tracker yields the handle's
    /// events and moves the transaction along with them.
    pub async fn broadcast(
        &self,
        tx: Transaction,
        client: &dyn ChainClient,
    ) -> Result<TrackedTransaction, WalletError> {
        tx.expect_status(TxStatus::Signed, "broadcast")?;
        let raw = tx
            .raw
            .clone()
            .ok_or_else(|| WalletError::InvalidState("Signed transaction has no raw bytes".into()))?;
        let chain_id = client.network().chain_id;
        if tx.chain_id != Some(chain_id) {
            return Err(WalletError::InvalidState(format!(
                "Transaction signed for chain {:?} cannot be sent on {} (chain {})",
                tx.chain_id,
                client.network().name,
                chain_id
            )));
        }

        let handle = match client.send_signed_transaction(raw).await {
            Ok(handle) => handle,
            Err(e) => {
                // Surface transport failure through the same event path as node rejection
                let (mut sender, handle) = events::channel(&client.network().name);
                sender.error(e);
                handle
            }
        };

        Ok(TrackedTransaction {
            chain_id,
            tx,
            handle,
            nonces: self.nonces.clone(),
            generation: 0,
        })
    }
}

/// A broadcast transaction together with its event handle.
#[derive(Debug)]
pub struct TrackedTransaction {
    tx: Transaction,
    handle: TransactionHandle,
    nonces: Arc<NonceManager>,
    chain_id: u64,
    generation: u64,
}

impl TrackedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn network(&self) -> &str {
        self.handle.network()
    }

    /// Session network generation this transaction was sent under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Sent under a network selection that has since been replaced.
    pub fn is_stale(&self, current_generation: u64) -> bool {
        self.generation != current_generation
    }

    /// Next event, applied to the transaction before it is returned.
    pub async fn next_event(&mut self) -> Option<TxEvent> {
        if self.tx.status.is_terminal() {
            return None;
        }
        let event = self.handle.next_event().await?;
        let applied = match &event {
            TxEvent::Hash(hash) => self.tx.mark_broadcast(*hash),
            TxEvent::Receipt(receipt) => self.tx.mark_confirmed(receipt.clone()),
            TxEvent::Error(error) => {
                let before_hash = self.tx.status == TxStatus::Signed;
                let result = self.tx.mark_failed(error.clone());
                if before_hash {
                    // Never reached the mempool, so the nonce was not used
                    self.nonces.reset(self.chain_id, self.tx.from).await;
                }
                result
            }
        };
        if let Err(e) = applied {
            warn!("Ignoring transaction event: {}", e);
        }
        Some(event)
    }

    /// Drive the transaction until a terminal event or until the handle closes.
    /// A closed handle leaves the last known state in place.
    pub async fn wait(mut self) -> Transaction {
        while self.next_event().await.is_some() {}
        self.tx
    }
}
