// src/lib.rs

pub mod blockchain;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod keystore;
pub mod session;
pub mod storage;

pub use crate::blockchain::traits::{ChainClient, ClientFactory};
pub use crate::core::errors::WalletError;
pub use crate::keystore::KeyStore;
pub use crate::session::WalletSession;
