pub mod accounts;
pub mod config;
pub mod domain;
pub mod errors;
pub mod nonce;
pub mod transaction;
pub mod units;
pub mod validation;
pub mod wallet;

// 重新导出关键结构
pub use accounts::{AccountRegistry, AccountSummary};
pub use transaction::{FeeParams, GasParams, TrackedTransaction, Transaction, TransactionManager, TxStatus};
pub use wallet::{Account, Wallet};
