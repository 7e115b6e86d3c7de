//! Ordered lifecycle events of one broadcast transaction.
//!
//! A handle yields at most one `Hash`, then at most one of `Receipt` or
//! `Error`. `EventSender` is the only producer and refuses anything that would
//! break that order, so consumers never have to re-check it.

use ethers::types::{TransactionReceipt, H256};
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::errors::WalletError;

#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    /// The node accepted the transaction.
    Hash(H256),
    /// The transaction was mined successfully. Terminal.
    Receipt(Box<TransactionReceipt>),
    /// The transaction was rejected, reverted or lost. Terminal.
    Error(WalletError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Submitted,
    Hashed,
    Finished,
}

/// Producer side of a [`TransactionHandle`].
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<TxEvent>,
    state: SenderState,
}

impl EventSender {
    /// Emit the hash. Only valid once, before any terminal event.
    pub fn hash(&mut self, hash: H256) -> bool {
        if self.state != SenderState::Submitted {
            warn!(?hash, "hash event out of order, dropped");
            return false;
        }
        self.state = SenderState::Hashed;
        self.send(TxEvent::Hash(hash))
    }

    /// Emit the receipt. Only valid after the hash.
    pub fn receipt(&mut self, receipt: TransactionReceipt) -> bool {
        if self.state != SenderState::Hashed {
            warn!(hash = ?receipt.transaction_hash, "receipt event out of order, dropped");
            return false;
        }
        self.state = SenderState::Finished;
        self.send(TxEvent::Receipt(Box::new(receipt)))
    }

    /// Emit the terminal error. Valid with or without a preceding hash.
    pub fn error(&mut self, error: WalletError) -> bool {
        if self.state == SenderState::Finished {
            warn!(%error, "error event after terminal event, dropped");
            return false;
        }
        self.state = SenderState::Finished;
        self.send(TxEvent::Error(error))
    }

    pub fn is_finished(&self) -> bool {
        self.state == SenderState::Finished
    }

    fn send(&self, event: TxEvent) -> bool {
        // A dropped handle means nobody is watching any more; the transaction still proceeds.
        self.tx.send(event).is_ok()
    }
}

/// Caller-visible lifecycle of one broadcast transaction.
#[derive(Debug)]
pub struct TransactionHandle {
    rx: mpsc::UnboundedReceiver<TxEvent>,
    network: String,
}

impl TransactionHandle {
    /// Next event, or `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<TxEvent> {
        self.rx.recv().await
    }

    /// Name of the network the transaction was submitted to.
    pub fn network(&self) -> &str {
        &self.network
    }
}

/// A connected sender/handle pair for a submission on `network`.
pub fn channel(network: &str) -> (EventSender, TransactionHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx, state: SenderState::Submitted },
        TransactionHandle { rx, network: network.to_string() },
    )
}
