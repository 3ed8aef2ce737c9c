//! Shared test helpers for EVM client tests

use std::time::Duration;

use chain_clients_common::{ClientSpec, RetryPolicy};
use serde_json::json;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Dummy bridge contract address (EVM format, 20 bytes)
pub const DUMMY_BRIDGE_CONTRACT_ADDR: &str = "0x00000000000000000000000000000000000000e1";

/// Dummy relayer address (EVM format, 20 bytes)
pub const DUMMY_RELAYER_ADDR: &str = "0x00000000000000000000000000000000000000a1";

/// Dummy sender address (EVM format, 20 bytes)
pub const DUMMY_SENDER_ADDR: &str = "0x0000000000000000000000000000000000000005";

/// Dummy token address (EVM format, 20 bytes)
pub const DUMMY_TOKEN_ADDR: &str = "0x000000000000000000000000000000000000000d";

/// Dummy transaction hash (64 hex characters)
#[allow(dead_code)]
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000010";

/// Dummy transfer key (64 hex characters)
#[allow(dead_code)]
pub const DUMMY_TRANSFER_KEY: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa";

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Builds a client spec pointed at a mock server.
#[allow(dead_code)]
pub fn build_test_spec(rpc_url: &str) -> ClientSpec {
    let mut settings = serde_json::Map::new();
    settings.insert("relayer_address".to_string(), json!(DUMMY_RELAYER_ADDR));
    settings.insert("gas_limit".to_string(), json!(200_000));
    ClientSpec {
        network_id: "ethereum".to_string(),
        kind: "evm".to_string(),
        rpc_url: rpc_url.to_string(),
        contract_address: DUMMY_BRIDGE_CONTRACT_ADDR.to_string(),
        rpc_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
        settings,
    }
}
