//! Transfer Records
//!
//! The durable record of one cross-chain transfer, plus the request and response
//! shapes the engine exchanges with callers. All field names serialize in
//! camelCase to match the external bridge interface.

mod status;

pub use status::TransferStatus;

use chain_clients_common::{Amount, ChainHealth};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata keys the engine writes into `TransferRecord::metadata`.
pub mod metadata_keys {
    /// "engine" for caller-initiated transfers, "chain" for locks first seen on chain
    pub const ORIGIN: &str = "origin";
    /// Set right before the lock is handed to the source chain
    pub const LOCK_SUBMISSION_STARTED_AT: &str = "lockSubmissionStartedAt";
    pub const SOURCE_BLOCK_HEIGHT: &str = "sourceBlockHeight";
    pub const SOURCE_SENDER: &str = "sourceSender";
    /// Completion sweeper claim, written under a version check
    pub const RELEASE_CLAIMED_AT: &str = "releaseClaimedAt";
    pub const RELEASE_CLAIMED_BY: &str = "releaseClaimedBy";
    pub const RELEASE_TX_HASH: &str = "releaseTxHash";
    pub const RELEASE_SUBMITTED_AT: &str = "releaseSubmittedAt";
    pub const FAILURE_REASON: &str = "failureReason";
    pub const FAILED_AT: &str = "failedAt";
    pub const CANCEL_REASON: &str = "cancelReason";
    pub const DISPUTE_REASON: &str = "disputeReason";
    pub const DISPUTED_AT: &str = "disputedAt";
}

pub const ORIGIN_ENGINE: &str = "engine";
pub const ORIGIN_CHAIN: &str = "chain";

// ============================================================================
// RECORDS
// ============================================================================

/// A validator's attestation over a transfer digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorSignature {
    pub validator_id: String,
    /// Base64-encoded Ed25519 signature
    pub signature: String,
    pub signed_at: DateTime<Utc>,
}

/// One cross-chain transfer attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub bridge_id: String,
    pub transfer_id: String,
    pub source_network: String,
    pub target_network: String,
    pub source_address: String,
    pub target_address: String,
    pub amount: Amount,
    pub token_symbol: String,
    pub fee: Option<Amount>,
    pub source_transaction_hash: Option<String>,
    pub target_transaction_hash: Option<String>,
    pub status: TransferStatus,
    pub validations: Vec<ValidatorSignature>,
    pub metadata: Map<String, Value>,
    pub error_message: Option<String>,
    /// Last observed confirmation depth of the source transaction
    pub source_confirmations: u64,
    /// Bumped by the store on every write; used for optimistic concurrency
    pub version: u64,
    pub initiated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransferRecord {
    /// Creates a fresh INITIATED record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bridge_id: &str,
        transfer_id: String,
        source_network: &str,
        target_network: &str,
        source_address: String,
        target_address: String,
        amount: Amount,
        token_symbol: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            bridge_id: bridge_id.to_string(),
            transfer_id,
            source_network: source_network.to_string(),
            target_network: target_network.to_string(),
            source_address,
            target_address,
            amount,
            token_symbol,
            fee: None,
            source_transaction_hash: None,
            target_transaction_hash: None,
            status: TransferStatus::Initiated,
            validations: Vec::new(),
            metadata: Map::new(),
            error_message: None,
            source_confirmations: 0,
            version: 0,
            initiated_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Parses an RFC 3339 timestamp stored in metadata.
    pub fn metadata_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.metadata_str(key)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn has_signature_from(&self, validator_id: &str) -> bool {
        self.validations.iter().any(|v| v.validator_id == validator_id)
    }
}

/// A registered attester for a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorInfo {
    pub id: String,
    /// Chain address of the validator's operator account
    pub address: String,
    /// Base64-encoded Ed25519 public key
    #[serde(alias = "public_key")]
    pub public_key: String,
    pub network: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_reputation")]
    pub reputation: u32,
}

/// A token the bridge accepts, with its address on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    #[serde(alias = "source_address")]
    pub source_address: String,
    #[serde(alias = "target_address")]
    pub target_address: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn default_reputation() -> u32 {
    100
}

// ============================================================================
// CALLER-FACING SHAPES
// ============================================================================

/// Transfer request as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetails {
    pub source_address: String,
    pub target_address: String,
    pub amount: Amount,
    pub token_symbol: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Snapshot of a transfer returned by initiate and status calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub transfer_id: String,
    pub bridge_id: String,
    pub status: TransferStatus,
    pub amount: Amount,
    pub token_symbol: String,
    pub fee: Option<Amount>,
    pub source_transaction_hash: Option<String>,
    pub target_transaction_hash: Option<String>,
    pub source_confirmations: u64,
    pub required_confirmations: u64,
    pub validations: usize,
    pub required_validations: usize,
    pub error_message: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionResponse {
    pub fn from_record(
        record: &TransferRecord,
        required_confirmations: u64,
        required_validations: usize,
    ) -> Self {
        Self {
            transfer_id: record.transfer_id.clone(),
            bridge_id: record.bridge_id.clone(),
            status: record.status,
            amount: record.amount,
            token_symbol: record.token_symbol.clone(),
            fee: record.fee,
            source_transaction_hash: record.source_transaction_hash.clone(),
            target_transaction_hash: record.target_transaction_hash.clone(),
            source_confirmations: record.source_confirmations,
            required_confirmations,
            validations: record.validations.len(),
            required_validations,
            error_message: record.error_message.clone(),
            initiated_at: record.initiated_at,
            updated_at: record.updated_at,
            completed_at: record.completed_at,
        }
    }
}

/// Fee decomposition for a prospective transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub source_network_fee: Amount,
    pub target_network_fee: Amount,
    pub bridge_fee: Amount,
    pub total_fee: Amount,
    pub estimated_time_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

/// Bridge health summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHealth {
    pub status: HealthStatus,
    pub active_validators: usize,
    pub total_validators: usize,
    pub pending_transactions: usize,
    pub average_completion_time_seconds: u64,
    pub volume_last_24h: Amount,
    pub fees_collected_last_24h: Amount,
    pub source_chain: ChainHealth,
    pub target_chain: ChainHealth,
}
