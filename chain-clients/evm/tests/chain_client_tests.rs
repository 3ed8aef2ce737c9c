//! Unit tests for the EVM bridge client

use std::str::FromStr;

use chain_clients_common::{Amount, ChainClient, ChainError, LockRequest, TxConfirmation};
use chain_clients_evm::{abi, EvmBridgeClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    build_test_spec, DUMMY_BRIDGE_CONTRACT_ADDR, DUMMY_SENDER_ADDR, DUMMY_TOKEN_ADDR,
    DUMMY_TRANSFER_KEY, DUMMY_TX_HASH,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

async fn mount_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": 1
        })))
        .mount(server)
        .await;
}

// ============================================================================
// CLIENT INITIALIZATION
// ============================================================================

/// Test that a valid spec builds a client
/// What is tested: EvmBridgeClient::new() with all required settings
/// Why: Client construction is the entry point for every EVM operation
#[test]
fn test_new_accepts_valid_spec() {
    let client = EvmBridgeClient::new(&build_test_spec("http://127.0.0.1:8545")).unwrap();
    assert_eq!(client.network_id(), "ethereum");
    assert!(client.is_valid_address(DUMMY_SENDER_ADDR));
    assert!(!client.is_valid_address("0x1234"));
    assert!(!client.is_valid_address("5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty"));
}

/// Test that a missing relayer address is a configuration error
/// What is tested: EvmBridgeClient::new() without relayer_address
/// Why: Misconfigured bridges must fail at registry build time
#[test]
fn test_new_rejects_missing_relayer() {
    let mut spec = build_test_spec("http://127.0.0.1:8545");
    spec.settings.remove("relayer_address");
    assert!(matches!(
        EvmBridgeClient::new(&spec),
        Err(ChainError::Configuration(_))
    ));
}

/// Test that an invalid contract address is a configuration error
/// What is tested: EvmBridgeClient::new() with a short contract address
/// Why: Missing contract addresses are fatal for a bridge
#[test]
fn test_new_rejects_invalid_contract() {
    let mut spec = build_test_spec("http://127.0.0.1:8545");
    spec.contract_address = "0x12".to_string();
    assert!(matches!(
        EvmBridgeClient::new(&spec),
        Err(ChainError::Configuration(_))
    ));
}

// ============================================================================
// CONFIRMATIONS
// ============================================================================

/// Test confirmation depth counting
/// What is tested: Receipt in block 100, head at 110 gives 11 confirmations
/// Why: The source monitor compares this against requiredConfirmations
#[tokio::test]
async fn test_confirmations_counts_depth() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "eth_getTransactionReceipt",
        json!({"status": "0x1", "blockNumber": "0x64"}),
    )
    .await;
    mount_rpc(&mock_server, "eth_blockNumber", json!("0x6e")).await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    let status = client.confirmations(DUMMY_TX_HASH).await.unwrap();
    assert_eq!(
        status,
        TxConfirmation::Confirmed {
            confirmations: 11,
            finalized: false
        }
    );
    assert!(!status.meets(12));
    assert!(status.meets(11));
}

/// Test that a reverted receipt reports failure
/// What is tested: Receipt with status 0x0
/// Why: Reverted locks must move the transfer to FAILED
#[tokio::test]
async fn test_confirmations_reports_revert() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "eth_getTransactionReceipt",
        json!({"status": "0x0", "blockNumber": "0x64"}),
    )
    .await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    let status = client.confirmations(DUMMY_TX_HASH).await.unwrap();
    assert!(matches!(status, TxConfirmation::Failed(_)));
}

/// Test pending versus unknown transactions
/// What is tested: No receipt, with and without a known transaction
/// Why: Dropped transactions are handled differently from pending ones
#[tokio::test]
async fn test_confirmations_pending_and_not_found() {
    let mock_server = MockServer::start().await;
    mount_rpc(&mock_server, "eth_getTransactionReceipt", json!(null)).await;
    mount_rpc(
        &mock_server,
        "eth_getTransactionByHash",
        json!({"hash": DUMMY_TX_HASH}),
    )
    .await;
    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    assert_eq!(
        client.confirmations(DUMMY_TX_HASH).await.unwrap(),
        TxConfirmation::Pending
    );

    let empty_server = MockServer::start().await;
    mount_rpc(&empty_server, "eth_getTransactionReceipt", json!(null)).await;
    mount_rpc(&empty_server, "eth_getTransactionByHash", json!(null)).await;
    let client = EvmBridgeClient::new(&build_test_spec(&empty_server.uri())).unwrap();
    assert_eq!(
        client.confirmations(DUMMY_TX_HASH).await.unwrap(),
        TxConfirmation::NotFound
    );
}

// ============================================================================
// SUBMISSION
// ============================================================================

/// Test that lock submission sends encoded calldata from the relayer
/// What is tested: eth_sendTransaction params and returned hash
/// Why: The lock is the first chain side effect of a transfer
#[tokio::test]
async fn test_submit_lock_returns_hash() {
    let mock_server = MockServer::start().await;
    let request = LockRequest {
        transfer_id: "transfer-1".to_string(),
        sender: DUMMY_SENDER_ADDR.to_string(),
        recipient: "f1recipient".to_string(),
        token_address: DUMMY_TOKEN_ADDR.to_string(),
        token_decimals: 6,
        amount: Amount::from_str("12.5").unwrap(),
    };
    let expected_data = format!(
        "0x{}",
        hex::encode(abi::encode_lock(
            &chain_clients_common::transfer_key("transfer-1"),
            &abi::parse_address(DUMMY_TOKEN_ADDR).unwrap(),
            12_500_000,
            "f1recipient",
        ))
    );
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_sendTransaction",
            "params": [{"to": DUMMY_BRIDGE_CONTRACT_ADDR, "data": expected_data}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": DUMMY_TX_HASH,
            "id": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    let hash = client.submit_lock(&request).await.unwrap();
    assert_eq!(hash, DUMMY_TX_HASH);
}

/// Test that an insufficient funds error is terminal
/// What is tested: JSON-RPC error mapping on submission
/// Why: Insufficient funds must fail the transfer rather than retry forever
#[tokio::test]
async fn test_submit_lock_insufficient_funds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32000, "message": "insufficient funds for gas * price + value"},
            "id": 1
        })))
        .mount(&mock_server)
        .await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    let request = LockRequest {
        transfer_id: "transfer-2".to_string(),
        sender: DUMMY_SENDER_ADDR.to_string(),
        recipient: "f1recipient".to_string(),
        token_address: DUMMY_TOKEN_ADDR.to_string(),
        token_decimals: 18,
        amount: Amount::from_units(1),
    };
    let err = client.submit_lock(&request).await.unwrap_err();
    assert!(matches!(err, ChainError::InsufficientFunds(_)));
    assert!(!err.is_transient());
}

// ============================================================================
// EVENTS AND FEES
// ============================================================================

/// Test that TokensLocked logs are parsed into lock events
/// What is tested: eth_getLogs parsing of indexed and data fields
/// Why: Ingestion of on-chain locks depends on this mapping
#[tokio::test]
async fn test_lock_events_parses_logs() {
    let mock_server = MockServer::start().await;
    let recipient = "So1anaRecipient";
    let data = format!(
        "0x{:0>64}{:064x}{:064x}{:064x}{:0<64}",
        DUMMY_TOKEN_ADDR.strip_prefix("0x").unwrap(),
        1_000_000u64,
        96u64,
        recipient.len(),
        hex::encode(recipient),
    );
    mount_rpc(
        &mock_server,
        "eth_getLogs",
        json!([{
            "address": DUMMY_BRIDGE_CONTRACT_ADDR,
            "topics": [
                abi::event_topic(abi::LOCKED_EVENT_SIGNATURE),
                DUMMY_TRANSFER_KEY,
                format!("0x000000000000000000000000{}", DUMMY_SENDER_ADDR.strip_prefix("0x").unwrap())
            ],
            "data": data,
            "blockNumber": "0x1000",
            "transactionHash": DUMMY_TX_HASH,
            "logIndex": "0x0"
        }]),
    )
    .await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    let events = client.lock_events(0x0f00, 0x1000).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tx_hash, DUMMY_TX_HASH);
    assert_eq!(events[0].transfer_key, DUMMY_TRANSFER_KEY);
    assert_eq!(events[0].sender, DUMMY_SENDER_ADDR);
    assert_eq!(events[0].recipient, recipient);
    assert_eq!(events[0].base_units, 1_000_000);
    assert_eq!(events[0].height, 0x1000);
}

/// Test that logs with a malformed sender topic are skipped
/// What is tested: A 66-byte sender topic with a multi-byte character at the address offset,
/// and a log with too few topics
/// Why: Node responses must never panic the monitor
#[tokio::test]
async fn test_lock_events_skips_malformed_topics() {
    let mock_server = MockServer::start().await;
    let bad_sender = format!("0x{}é{}", "a".repeat(23), "b".repeat(39));
    assert_eq!(bad_sender.len(), 66);
    mount_rpc(
        &mock_server,
        "eth_getLogs",
        json!([
            {
                "address": DUMMY_BRIDGE_CONTRACT_ADDR,
                "topics": [abi::event_topic(abi::LOCKED_EVENT_SIGNATURE), DUMMY_TRANSFER_KEY, bad_sender],
                "data": "0x",
                "blockNumber": "0x1000",
                "transactionHash": DUMMY_TX_HASH,
                "logIndex": "0x0"
            },
            {
                "address": DUMMY_BRIDGE_CONTRACT_ADDR,
                "topics": [abi::event_topic(abi::LOCKED_EVENT_SIGNATURE)],
                "data": "0x",
                "blockNumber": "0x1000",
                "transactionHash": DUMMY_TX_HASH,
                "logIndex": "0x1"
            }
        ]),
    )
    .await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    assert!(client.lock_events(0x0f00, 0x1000).await.unwrap().is_empty());
}

/// Test gas price times gas limit fee model
/// What is tested: fee_quote() with 1 gwei and gas limit 200000
/// Why: Account-model chains price a message by gas
#[tokio::test]
async fn test_fee_quote_uses_gas_price() {
    let mock_server = MockServer::start().await;
    mount_rpc(&mock_server, "eth_gasPrice", json!("0x3b9aca00")).await;

    let client = EvmBridgeClient::new(&build_test_spec(&mock_server.uri())).unwrap();
    let quote = client.fee_quote().await.unwrap();
    assert_eq!(quote.fee.to_string(), "0.0002");
    assert_eq!(quote.block_time_secs, 12);
}

/// Test that health reports an unreachable node
/// What is tested: health() against a closed port
/// Why: Bridge health aggregates per-chain liveness
#[tokio::test]
async fn test_health_unreachable() {
    let client = EvmBridgeClient::new(&build_test_spec("http://127.0.0.1:1")).unwrap();
    let health = client.health().await;
    assert!(!health.healthy);
    assert!(health.detail.is_some());
}
