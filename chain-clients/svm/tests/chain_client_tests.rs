//! Unit tests for the SVM bridge client

use std::str::FromStr;

use borsh::BorshDeserialize;
use chain_clients_common::{Amount, ChainClient, ChainError, LockRequest, TxConfirmation};
use chain_clients_svm::instruction::{self, BridgeInstruction};
use chain_clients_svm::SvmBridgeClient;
use serde_json::json;
use solana_sdk::signature::Keypair;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{build_test_spec, DUMMY_MINT, DUMMY_PROGRAM_ID, DUMMY_SIGNATURE, DUMMY_TRANSFER_KEY};

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

/// Test that SvmBridgeClient rejects invalid program ids
/// What is tested: new() with a non-base58 program id
/// Why: Misconfigured program ids should fail fast at registry build time
#[test]
fn test_new_rejects_invalid_program_id() {
    let mut spec = build_test_spec("http://127.0.0.1:8899", "SVM_TEST_PAYER_UNUSED");
    spec.contract_address = "not-a-pubkey".to_string();
    assert!(matches!(
        SvmBridgeClient::new(&spec),
        Err(ChainError::Configuration(_))
    ));
}

/// Test address validation
/// What is tested: is_valid_address() for base58 and EVM-style inputs
/// Why: Caller-facing validation rejects malformed addresses before persisting
#[test]
fn test_is_valid_address() {
    let client =
        SvmBridgeClient::new(&build_test_spec("http://127.0.0.1:8899", "SVM_TEST_PAYER_UNUSED"))
            .unwrap();
    assert!(client.is_valid_address(DUMMY_MINT));
    assert!(!client.is_valid_address("0x0000000000000000000000000000000000000005"));
    assert!(!client.is_valid_address(""));
}

// ============================================================================
// INSTRUCTIONS AND LOGS
// ============================================================================

/// Test borsh layout of the lock instruction
/// What is tested: Instruction data decodes back into LockTokens
/// Why: The on-chain program decodes these bytes with the same layout
#[test]
fn test_lock_instruction_data() {
    let program = solana_sdk::pubkey::Pubkey::from_str(test_helpers::DUMMY_PROGRAM_ID).unwrap();
    let mint = solana_sdk::pubkey::Pubkey::from_str(DUMMY_MINT).unwrap();
    let ix = instruction::lock_instruction(&program, &mint, &mint, &mint, [7u8; 32], 42, "0xabc")
        .unwrap();
    let decoded = BridgeInstruction::try_from_slice(&ix.data).unwrap();
    assert_eq!(
        decoded,
        BridgeInstruction::LockTokens {
            transfer_id: [7u8; 32],
            amount: 42,
            recipient: "0xabc".to_string()
        }
    );
    assert_eq!(ix.accounts.len(), 5);
    assert!(ix.accounts[0].is_signer);
}

/// Test parsing of BridgeLock log lines
/// What is tested: Well-formed and truncated lines
/// Why: Lock events on SVM are recovered from program logs
#[test]
fn test_parse_lock_log() {
    let line = format!(
        "Program log: BridgeLock transfer={} sender={} token={} amount=1500 recipient=0xabc",
        DUMMY_TRANSFER_KEY.trim_start_matches("0x"),
        DUMMY_MINT,
        DUMMY_MINT
    );
    let log = instruction::parse_lock_log(&line).unwrap();
    assert_eq!(log.transfer_key, DUMMY_TRANSFER_KEY);
    assert_eq!(log.amount, 1500);
    assert_eq!(log.recipient, "0xabc");

    assert!(instruction::parse_lock_log("Program log: BridgeLock transfer=aa").is_none());
}

// ============================================================================
// RPC BEHAVIOUR
// ============================================================================

/// Test slot-based confirmation counting
/// What is tested: getSignatureStatuses with a confirmed (not finalized) status
/// Why: The source monitor compares slot depth against requiredConfirmations
#[tokio::test]
async fn test_confirmations_counts_slots() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "getSignatureStatuses",
        json!({
            "context": {"slot": 120},
            "value": [{"slot": 100, "confirmations": 20, "err": null, "confirmationStatus": "confirmed"}]
        }),
    )
    .await;

    let client =
        SvmBridgeClient::new(&build_test_spec(&mock_server.uri(), "SVM_TEST_PAYER_UNUSED")).unwrap();
    let status = client.confirmations(DUMMY_SIGNATURE).await.unwrap();
    assert_eq!(
        status,
        TxConfirmation::Confirmed {
            confirmations: 21,
            finalized: false
        }
    );
}

/// Test that finalized and failed statuses are reported
/// What is tested: finalized flag and err field mapping
/// Why: Finalized transactions are final regardless of depth; errors fail the transfer
#[tokio::test]
async fn test_confirmations_finalized_and_failed() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "getSignatureStatuses",
        json!({
            "context": {"slot": 101},
            "value": [{"slot": 100, "confirmations": null, "err": null, "confirmationStatus": "finalized"}]
        }),
    )
    .await;
    let client =
        SvmBridgeClient::new(&build_test_spec(&mock_server.uri(), "SVM_TEST_PAYER_UNUSED")).unwrap();
    let status = client.confirmations(DUMMY_SIGNATURE).await.unwrap();
    assert!(status.meets(32));

    let failing_server = MockServer::start().await;
    mount_rpc(
        &failing_server,
        "getSignatureStatuses",
        json!({
            "context": {"slot": 101},
            "value": [{"slot": 100, "confirmations": 1, "err": {"InstructionError": [0, "Custom"]}, "confirmationStatus": "confirmed"}]
        }),
    )
    .await;
    let client =
        SvmBridgeClient::new(&build_test_spec(&failing_server.uri(), "SVM_TEST_PAYER_UNUSED"))
            .unwrap();
    assert!(matches!(
        client.confirmations(DUMMY_SIGNATURE).await.unwrap(),
        TxConfirmation::Failed(_)
    ));
}

/// Test that an unknown signature is reported as not found
/// What is tested: getSignatureStatuses returning [null]
/// Why: Dropped transactions must be distinguishable from pending ones
#[tokio::test]
async fn test_confirmations_not_found() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "getSignatureStatuses",
        json!({"context": {"slot": 5}, "value": [null]}),
    )
    .await;
    let client =
        SvmBridgeClient::new(&build_test_spec(&mock_server.uri(), "SVM_TEST_PAYER_UNUSED")).unwrap();
    assert_eq!(
        client.confirmations(DUMMY_SIGNATURE).await.unwrap(),
        TxConfirmation::NotFound
    );
}

/// Test lock submission with a locally signed transaction
/// What is tested: getLatestBlockhash + sendTransaction with a payer from env
/// Why: SVM locks are signed in-process before broadcast
#[tokio::test]
async fn test_submit_lock_signs_and_sends() {
    let payer = Keypair::new();
    std::env::set_var(
        "SVM_TEST_PAYER_SUBMIT",
        bs58::encode(payer.to_bytes()).into_string(),
    );

    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "getLatestBlockhash",
        json!({
            "context": {"slot": 1},
            "value": {"blockhash": "11111111111111111111111111111111", "lastValidBlockHeight": 100}
        }),
    )
    .await;
    mount_rpc(&mock_server, "sendTransaction", json!(DUMMY_SIGNATURE)).await;

    let client =
        SvmBridgeClient::new(&build_test_spec(&mock_server.uri(), "SVM_TEST_PAYER_SUBMIT")).unwrap();
    let request = LockRequest {
        transfer_id: "transfer-1".to_string(),
        sender: DUMMY_MINT.to_string(),
        recipient: "0x0000000000000000000000000000000000000005".to_string(),
        token_address: DUMMY_MINT.to_string(),
        token_decimals: 9,
        amount: Amount::from_str("1.5").unwrap(),
    };
    let signature = client.submit_lock(&request).await.unwrap();
    assert_eq!(signature, DUMMY_SIGNATURE);
}

/// Test that a missing payer key env var is a configuration error
/// What is tested: submit_lock() without the env var set
/// Why: Key material is loaded at call time and must fail loudly
#[tokio::test]
async fn test_submit_lock_without_payer_key() {
    let client =
        SvmBridgeClient::new(&build_test_spec("http://127.0.0.1:1", "SVM_TEST_PAYER_MISSING"))
            .unwrap();
    let request = LockRequest {
        transfer_id: "transfer-2".to_string(),
        sender: DUMMY_MINT.to_string(),
        recipient: "0xabc".to_string(),
        token_address: DUMMY_MINT.to_string(),
        token_decimals: 9,
        amount: Amount::from_units(1),
    };
    assert!(matches!(
        client.submit_lock(&request).await,
        Err(ChainError::Configuration(_))
    ));
}

/// Test that lock events are recovered from program logs
/// What is tested: getSignaturesForAddress + getTransaction filtering by slot range
/// Why: Locks started outside the engine must still be ingested
#[tokio::test]
async fn test_lock_events_from_logs() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "getSignaturesForAddress",
        json!([
            {"signature": DUMMY_SIGNATURE, "slot": 50, "err": null},
            {"signature": "out-of-range", "slot": 500, "err": null}
        ]),
    )
    .await;
    mount_rpc(
        &mock_server,
        "getTransaction",
        json!({
            "slot": 50,
            "meta": {
                "err": null,
                "logMessages": [
                    "Program 11111111111111111111111111111111 invoke [1]",
                    format!(
                        "Program log: BridgeLock transfer={} sender={} token={} amount=2000000000 recipient=0x0000000000000000000000000000000000000005",
                        DUMMY_TRANSFER_KEY.trim_start_matches("0x"), DUMMY_MINT, DUMMY_MINT
                    )
                ]
            }
        }),
    )
    .await;

    let client =
        SvmBridgeClient::new(&build_test_spec(&mock_server.uri(), "SVM_TEST_PAYER_UNUSED")).unwrap();
    let events = client.lock_events(40, 60).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tx_hash, DUMMY_SIGNATURE);
    assert_eq!(events[0].transfer_key, DUMMY_TRANSFER_KEY);
    assert_eq!(events[0].base_units, 2_000_000_000);
    assert_eq!(events[0].height, 50);
}

/// Test that signature history is paged back to the scan window
/// What is tested: A first page of newer signatures, then a `before` page holding the lock
/// Why: A busy program can push in-window locks past the first page
#[tokio::test]
async fn test_lock_events_paginate_signatures() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "getSignaturesForAddress",
        json!([
            {"signature": "newer-1", "slot": 80, "err": null},
            {"signature": "newer-2", "slot": 70, "err": null}
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "getSignaturesForAddress",
            "params": [DUMMY_PROGRAM_ID, { "before": "newer-2" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": [{"signature": DUMMY_SIGNATURE, "slot": 50, "err": null}],
            "id": 1
        })))
        .with_priority(1)
        .mount(&mock_server)
        .await;
    mount_rpc(
        &mock_server,
        "getTransaction",
        json!({
            "slot": 50,
            "meta": {
                "err": null,
                "logMessages": [format!(
                    "Program log: BridgeLock transfer={} sender={} token={} amount=5 recipient=0x0000000000000000000000000000000000000005",
                    DUMMY_TRANSFER_KEY.trim_start_matches("0x"), DUMMY_MINT, DUMMY_MINT
                )]
            }
        }),
    )
    .await;

    let mut spec = build_test_spec(&mock_server.uri(), "SVM_TEST_PAYER_UNUSED");
    spec.settings.insert("signature_limit".to_string(), json!(2));
    let client = SvmBridgeClient::new(&spec).unwrap();
    let events = client.lock_events(40, 60).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tx_hash, DUMMY_SIGNATURE);
    assert_eq!(events[0].base_units, 5);
    let signature_calls = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains("getSignaturesForAddress"))
        .count();
    assert_eq!(signature_calls, 2);
}

/// Test the fixed per-message fee model
/// What is tested: fee_quote() with the default lamports per signature
/// Why: Non-gas chains charge a fixed cost per message
#[tokio::test]
async fn test_fee_quote_fixed() {
    let client =
        SvmBridgeClient::new(&build_test_spec("http://127.0.0.1:1", "SVM_TEST_PAYER_UNUSED"))
            .unwrap();
    let quote = client.fee_quote().await.unwrap();
    assert_eq!(quote.fee.to_string(), "0.000005");
}
