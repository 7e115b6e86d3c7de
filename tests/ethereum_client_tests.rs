//! tests/ethereum_client_tests.rs
//!
//! EthereumClient against ethers' MockProvider. MockProvider is LIFO: the last
//! pushed response answers the first request, so each test pushes exactly what
//! its single call consumes.

use crypto_wallet::blockchain::ethereum::EthereumClient;
use crypto_wallet::blockchain::events::TxEvent;
use crypto_wallet::blockchain::traits::ChainClient;
use crypto_wallet::core::config::{FeeMode, Network};
use crypto_wallet::core::errors::WalletError;
use crypto_wallet::core::transaction::FeeParams;
use ethers::providers::{JsonRpcError, MockProvider, MockResponse, Provider};
use ethers::types::{Address, Bytes, H256, U256};
use serde_json::json;
use std::str::FromStr;

// Helper function to create a mock client with a provider handle
fn create_mock_client() -> (EthereumClient<MockProvider>, MockProvider) {
    let mock = MockProvider::new();
    let handle = mock.clone();
    let provider = Provider::new(mock);
    let network = Network::new("Local", "http://127.0.0.1:8545", "https://explorer.local", 31337);
    (EthereumClient::new_with_provider(provider, network), handle)
}

fn address() -> Address {
    Address::from_str("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap()
}

#[tokio::test]
async fn get_balance_returns_atomic_units() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(2_500_000_000_000_000_000u128))));

    let balance = client.get_balance(&address()).await.unwrap();
    assert_eq!(balance, U256::from(2_500_000_000_000_000_000u128));
}

#[tokio::test]
async fn get_balance_malformed_response_is_network_error() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!({ "unexpected": true })));

    assert!(matches!(client.get_balance(&address()).await, Err(WalletError::NetworkError(_))));
}

#[tokio::test]
async fn get_balance_without_response_is_network_error() {
    let (client, _mock) = create_mock_client();
    let err = client.get_balance(&address()).await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn pending_nonce_is_read_from_node() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(42))));
    assert_eq!(client.get_transaction_count(&address()).await.unwrap(), U256::from(42));
}

#[tokio::test]
async fn eip1559_fees_derived_from_gas_price() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(20_000_000_000u64))));

    let fees = client.suggest_fees(FeeMode::Eip1559).await.unwrap();
    assert_eq!(
        fees,
        FeeParams::Eip1559 {
            max_fee_per_gas: U256::from(40_000_000_000u64),
            max_priority_fee_per_gas: U256::from(2_000_000_000u64),
        }
    );
}

#[tokio::test]
async fn priority_fee_has_one_gwei_floor() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(2_000_000_000u64))));

    match client.suggest_fees(FeeMode::Eip1559).await.unwrap() {
        FeeParams::Eip1559 { max_priority_fee_per_gas, .. } => {
            assert_eq!(max_priority_fee_per_gas, U256::from(1_000_000_000u64))
        }
        other => panic!("unexpected fees {:?}", other),
    }
}

#[tokio::test]
async fn legacy_fees_use_gas_price() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(7u64))));
    assert_eq!(
        client.suggest_fees(FeeMode::Legacy).await.unwrap(),
        FeeParams::Legacy { gas_price: U256::from(7u64) }
    );
}

#[tokio::test]
async fn node_rejection_arrives_as_error_event() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Error(JsonRpcError {
        code: -32000,
        message: "insufficient funds for gas * price + value".to_string(),
        data: None,
    }));

    let mut handle = client.send_signed_transaction(Bytes::from(vec![0x02, 0x01])).await.unwrap();
    assert_eq!(handle.network(), "Local");
    assert_eq!(
        handle.next_event().await,
        Some(TxEvent::Error(WalletError::TransactionError(
            "insufficient funds for gas * price + value".into()
        )))
    );
    assert_eq!(handle.next_event().await, None);
}

#[tokio::test]
async fn accepted_submission_yields_hash_first() {
    let (client, mock) = create_mock_client();
    let tx_hash =
        H256::from_str("0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef").unwrap();
    mock.push_response(MockResponse::Value(json!(tx_hash)));

    let mut handle = client.send_signed_transaction(Bytes::from(vec![0x02, 0x01])).await.unwrap();
    assert_eq!(handle.next_event().await, Some(TxEvent::Hash(tx_hash)));
}

#[tokio::test]
async fn chain_id_mismatch_is_config_error() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(1))));
    assert!(matches!(client.verify_chain_id().await, Err(WalletError::ConfigError(_))));
}

#[tokio::test]
async fn matching_chain_id_is_accepted() {
    let (client, mock) = create_mock_client();
    mock.push_response(MockResponse::Value(json!(U256::from(31337))));
    client.verify_chain_id().await.unwrap();
}
