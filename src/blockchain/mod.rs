pub mod ethereum;
pub mod events;
pub mod traits;

pub use events::{TransactionHandle, TxEvent};
pub use traits::{ChainClient, ClientFactory};
