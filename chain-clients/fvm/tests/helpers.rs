//! Shared test helpers for FVM client tests

use std::time::Duration;

use chain_clients_common::{ClientSpec, RetryPolicy};
use serde_json::json;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Dummy bridge actor address (ID address)
pub const DUMMY_ACTOR_ADDR: &str = "f01234";

/// Dummy wallet address (secp256k1, 41 chars)
pub const DUMMY_WALLET_ADDR: &str = "f1abjxfbp274xpdqcpuaykwkfb43omjotacm2p3za";

/// Dummy message CID
#[allow(dead_code)]
pub const DUMMY_MESSAGE_CID: &str = "bafy2bzacea3wsdh6y3a36tb3skempjoxqpuyompjbmfeyf34fi3uy6uue42v4";

/// Dummy transfer key (64 hex characters)
#[allow(dead_code)]
pub const DUMMY_TRANSFER_KEY: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa";

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Builds a client spec pointed at a mock server.
pub fn build_test_spec(rpc_url: &str) -> ClientSpec {
    let mut settings = serde_json::Map::new();
    settings.insert("from_address".to_string(), json!(DUMMY_WALLET_ADDR));
    ClientSpec {
        network_id: "filecoin".to_string(),
        kind: "fvm".to_string(),
        rpc_url: rpc_url.to_string(),
        contract_address: DUMMY_ACTOR_ADDR.to_string(),
        rpc_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
        settings,
    }
}
