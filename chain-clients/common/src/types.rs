//! Shared Bridge Types
//!
//! Request, event and status shapes exchanged between the bridge engine and the
//! per-chain clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::amount::Amount;
use crate::error::ChainError;
use crate::rpc::RetryPolicy;

// ============================================================================
// FINALITY
// ============================================================================

/// How a chain signals that a transaction is irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalityModel {
    /// Count of blocks built on top of the including block
    BlockConfirmations,
    /// Count of slots since the including slot
    SlotConfirmations,
    /// A successful execution receipt is final on its own
    ReceiptAcknowledgment,
}

/// Confirmation state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxConfirmation {
    /// The chain does not know the transaction (dropped, or not yet propagated)
    NotFound,
    /// Known but not yet included
    Pending,
    /// Included and failed; the reason comes from the chain
    Failed(String),
    /// Included and succeeded
    Confirmed {
        /// Depth below the current head, counting the including block as one
        confirmations: u64,
        /// The chain itself reports the transaction as final
        finalized: bool,
    },
}

impl TxConfirmation {
    /// Returns true when the transaction is confirmed at or beyond `required` depth.
    pub fn meets(&self, required: u64) -> bool {
        match self {
            TxConfirmation::Confirmed {
                confirmations,
                finalized,
            } => *finalized || *confirmations >= required,
            _ => false,
        }
    }
}

// ============================================================================
// REQUESTS AND EVENTS
// ============================================================================

/// Lock submission on the source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    /// Engine-assigned transfer id
    pub transfer_id: String,
    /// Depositor address on the source chain
    pub sender: String,
    /// Beneficiary address on the target chain (opaque to the source chain)
    pub recipient: String,
    /// Source-chain token contract / mint / actor address
    pub token_address: String,
    /// Token decimals used for base-unit conversion
    pub token_decimals: u32,
    pub amount: Amount,
}

/// Release submission on the target chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub transfer_id: String,
    pub recipient: String,
    /// Target-chain token contract / mint / actor address
    pub token_address: String,
    pub token_decimals: u32,
    pub amount: Amount,
    /// Lock transaction that backs this release
    pub source_tx_hash: String,
}

/// A lock observed on the source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEvent {
    pub tx_hash: String,
    /// On-chain transfer key (0x-prefixed 32-byte hex)
    pub transfer_key: String,
    pub sender: String,
    pub recipient: String,
    pub token_address: String,
    /// Locked value in token base units
    pub base_units: u128,
    /// Block / slot / epoch that included the lock
    pub height: u64,
}

/// Network fee estimate for one bridge message on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFeeQuote {
    /// Fee in the chain's native token
    pub fee: Amount,
    /// Expected seconds until the transaction reaches finality
    pub block_time_secs: u64,
}

/// Liveness snapshot of a chain endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHealth {
    pub network: String,
    pub healthy: bool,
    pub height: Option<u64>,
    pub latency_ms: u64,
    pub detail: Option<String>,
}

// ============================================================================
// CLIENT CONSTRUCTION
// ============================================================================

/// Everything a chain client needs to connect.
#[derive(Debug, Clone)]
pub struct ClientSpec {
    /// Network identifier used by the bridge (e.g., "ethereum")
    pub network_id: String,
    /// Client kind from the registration table (e.g., "evm")
    pub kind: String,
    pub rpc_url: String,
    /// Bridge contract / program / actor address on this network
    pub contract_address: String,
    pub rpc_timeout: Duration,
    pub retry: RetryPolicy,
    /// Chain-specific settings
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl ClientSpec {
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        self.settings.get(key).and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }

    /// Returns a required string setting or a configuration error naming it.
    pub fn require_str(&self, key: &str) -> Result<&str, ChainError> {
        self.setting_str(key).ok_or_else(|| {
            ChainError::Configuration(format!(
                "network '{}' is missing required setting '{}'",
                self.network_id, key
            ))
        })
    }
}

// ============================================================================
// TRANSFER KEYS
// ============================================================================

/// Derives the 32-byte on-chain key for a transfer id.
///
/// Ids that already are 0x-prefixed 32-byte hex (transfers first seen on chain)
/// map to themselves; any other id is hashed with SHA-256.
pub fn transfer_key(transfer_id: &str) -> [u8; 32] {
    if let Some(stripped) = transfer_id.strip_prefix("0x") {
        if stripped.len() == 64 {
            if let Ok(bytes) = hex::decode(stripped) {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                return key;
            }
        }
    }
    let digest = Sha256::digest(transfer_id.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Hex form of [`transfer_key`].
pub fn transfer_key_hex(transfer_id: &str) -> String {
    format!("0x{}", hex::encode(transfer_key(transfer_id)))
}
