//! Network Adapter Contract
//!
//! The operations every bridge adapter offers, independent of the chains behind
//! it. The engine, the monitor loops and the registry only ever hold a
//! `dyn NetworkAdapter`; chain differences live in the `ChainClient`s that
//! [`ChainBridgeAdapter`] is built from.

mod chain;

pub use chain::{AdapterSettings, ChainBridgeAdapter};

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::quorum::QuorumOutcome;
use crate::transfer::{
    BridgeHealth, FeeEstimate, TokenInfo, TransactionResponse, TransferDetails, ValidatorInfo,
};

/// What one monitor or sweep pass did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    /// New records created from lock events, or records reconciled with one
    pub ingested: usize,
    /// Forward status transitions performed
    pub advanced: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items left for the next cycle after a transient error
    pub deferred: usize,
}

impl MonitorReport {
    pub fn is_idle(&self) -> bool {
        *self == MonitorReport::default()
    }
}

#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    fn bridge_id(&self) -> &str;

    /// Seeds validators and tokens, checks key material, positions the source scan.
    async fn initialize(&self) -> Result<(), BridgeError>;

    /// Releases chain client resources.
    async fn shutdown(&self);

    async fn get_health(&self) -> Result<BridgeHealth, BridgeError>;

    async fn get_supported_tokens(&self) -> Result<Vec<TokenInfo>, BridgeError>;

    async fn get_validators(&self) -> Result<Vec<ValidatorInfo>, BridgeError>;

    async fn estimate_fee(&self, details: &TransferDetails) -> Result<FeeEstimate, BridgeError>;

    /// Validates the request, persists an INITIATED record, then submits the lock.
    ///
    /// Only request validation errors are returned; chain outcomes are reflected
    /// in the returned status.
    async fn initiate_transfer(&self, details: &TransferDetails) -> Result<TransactionResponse, BridgeError>;

    async fn get_transaction_status(&self, transfer_id: &str) -> Result<TransactionResponse, BridgeError>;

    /// Submits a validator signature to the quorum.
    async fn validate_transaction(
        &self,
        transfer_id: &str,
        validator_id: &str,
        signature: &str,
    ) -> Result<QuorumOutcome, BridgeError>;

    /// VALIDATED -> COMPLETED with the release transaction hash.
    async fn complete_transfer(&self, transfer_id: &str, target_hash: &str) -> Result<TransactionResponse, BridgeError>;

    /// One source monitor pass: ingest lock events, advance confirmations, sign.
    async fn monitor_source_chain(&self) -> Result<MonitorReport, BridgeError>;

    /// One completion sweeper pass over VALIDATED records.
    async fn monitor_target_chain(&self) -> Result<MonitorReport, BridgeError>;

    /// Recovery sweep over INITIATED records.
    async fn sync_pending_transactions(&self) -> Result<MonitorReport, BridgeError>;

    async fn register_validator(&self, validator: ValidatorInfo) -> Result<(), BridgeError>;

    async fn remove_validator(&self, validator_id: &str) -> Result<bool, BridgeError>;

    /// INITIATED -> CANCELLED, only before the lock was handed to the chain.
    async fn cancel_transfer(&self, transfer_id: &str, reason: &str) -> Result<TransactionResponse, BridgeError>;

    /// VALIDATED -> DISPUTED. The record is frozen afterwards.
    async fn dispute_transfer(&self, transfer_id: &str, reason: &str) -> Result<TransactionResponse, BridgeError>;
}
