//! Shared chain client library
//!
//! Common contract, transport and value types for the bridge's chain backends.

pub mod amount;
pub mod client;
pub mod error;
pub mod rpc;
pub mod types;

pub use amount::{Amount, AmountError, AMOUNT_DECIMALS};
pub use client::ChainClient;
pub use error::ChainError;
pub use rpc::{JsonRpcClient, RetryPolicy};
pub use types::{
    transfer_key, transfer_key_hex, ChainHealth, ClientSpec, FinalityModel, LockEvent,
    LockRequest, NetworkFeeQuote, ReleaseRequest, TxConfirmation,
};

/// Ensures a hex string carries a `0x` prefix.
pub fn normalize_hex(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{}", value)
    }
}

/// Parses a `0x`-prefixed hex quantity (e.g., "0x1b4").
pub fn parse_hex_u64(value: &str) -> Result<u64, ChainError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(stripped, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("Invalid hex quantity '{}': {}", value, e)))
}
