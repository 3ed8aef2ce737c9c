//! Shared test helpers for SVM client tests

use std::time::Duration;

use chain_clients_common::{ClientSpec, RetryPolicy};
use serde_json::json;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Dummy bridge program id (valid base58 pubkey string)
pub const DUMMY_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// Dummy mint / account pubkey (valid base58, 32 bytes)
pub const DUMMY_MINT: &str = "So11111111111111111111111111111111111111112";

/// Dummy transaction signature (base58)
#[allow(dead_code)]
pub const DUMMY_SIGNATURE: &str =
    "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";

/// Dummy transfer key (64 hex characters)
#[allow(dead_code)]
pub const DUMMY_TRANSFER_KEY: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa";

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Builds a client spec pointed at a mock server.
pub fn build_test_spec(rpc_url: &str, payer_key_env: &str) -> ClientSpec {
    let mut settings = serde_json::Map::new();
    settings.insert("payer_key_env".to_string(), json!(payer_key_env));
    ClientSpec {
        network_id: "solana".to_string(),
        kind: "svm".to_string(),
        rpc_url: rpc_url.to_string(),
        contract_address: DUMMY_PROGRAM_ID.to_string(),
        rpc_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
        settings,
    }
}
