//! Transfer Store
//!
//! The store is the single source of truth for transfer records, validators and
//! supported tokens. Every mutation of a transfer is conditional: it names the
//! status (and optionally the version) the writer last observed, and the store
//! rejects the write when the record has moved on. Concurrent engine instances
//! rely on this instead of any cross-instance lock.

mod memory;

pub use memory::InMemoryTransferStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::transfer::{TokenInfo, TransferRecord, TransferStatus, ValidatorInfo, ValidatorSignature};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transfer {0} not found")]
    NotFound(String),

    #[error("transfer {0} already exists")]
    DuplicateTransfer(String),

    #[error("source transaction {0} is already recorded")]
    DuplicateSourceHash(String),

    #[error("transfer {transfer_id} is {actual}, expected {expected}")]
    StaleStatus {
        transfer_id: String,
        expected: TransferStatus,
        actual: TransferStatus,
    },

    #[error("transfer {transfer_id} is at version {actual}, expected {expected}")]
    VersionConflict {
        transfer_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("transfer {0} is {1} and can no longer change")]
    Immutable(String, TransferStatus),

    #[error("transfer {transfer_id} cannot move from {from} to {to}")]
    IllegalTransition {
        transfer_id: String,
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("validator {validator_id} already signed transfer {transfer_id}")]
    DuplicateValidation {
        transfer_id: String,
        validator_id: String,
    },

    #[error("transfer {0} already has a different source transaction hash")]
    SourceHashAlreadySet(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Backend could not be reached; the caller retries next cycle
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the write lost a race against another writer. Monitors treat
    /// these as "someone else already handled it".
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::StaleStatus { .. }
                | StoreError::VersionConflict { .. }
                | StoreError::DuplicateSourceHash(_)
                | StoreError::DuplicateTransfer(_)
                | StoreError::DuplicateValidation { .. }
        )
    }
}

// ============================================================================
// CONDITIONAL UPDATE
// ============================================================================

/// Changes applied by [`TransferStore::update_status`].
///
/// `new_status: None` keeps the current status and only applies the field
/// changes. A metadata value of `Value::Null` removes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub new_status: Option<TransferStatus>,
    pub expected_version: Option<u64>,
    pub source_transaction_hash: Option<String>,
    pub source_confirmations: Option<u64>,
    pub metadata: Map<String, Value>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    /// Moves the record to `status`.
    pub fn to(status: TransferStatus) -> Self {
        Self {
            new_status: Some(status),
            ..Self::default()
        }
    }

    /// Keeps the status and only touches fields.
    pub fn fields() -> Self {
        Self::default()
    }

    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn with_source_hash(mut self, hash: impl Into<String>) -> Self {
        self.source_transaction_hash = Some(hash.into());
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.source_confirmations = Some(confirmations);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Persists a new INITIATED record. Rejects a duplicate transfer id, and a
    /// source hash that another record of the same bridge already carries.
    async fn create_transfer(&self, record: TransferRecord) -> Result<TransferRecord, StoreError>;

    async fn get_transfer(&self, transfer_id: &str) -> Result<Option<TransferRecord>, StoreError>;

    async fn find_by_source_hash(
        &self,
        bridge_id: &str,
        source_hash: &str,
    ) -> Result<Option<TransferRecord>, StoreError>;

    /// Records of a bridge in `status`, oldest first.
    async fn list_by_status(
        &self,
        bridge_id: &str,
        status: TransferStatus,
    ) -> Result<Vec<TransferRecord>, StoreError>;

    async fn list_transfers(&self, bridge_id: &str) -> Result<Vec<TransferRecord>, StoreError>;

    /// Applies `update` only if the record is still in `expected` status (and at
    /// `update.expected_version` when given). Terminal records are immutable.
    async fn update_status(
        &self,
        transfer_id: &str,
        expected: TransferStatus,
        update: StatusUpdate,
    ) -> Result<TransferRecord, StoreError>;

    /// Appends a validator signature to a PENDING_VALIDATION record at
    /// `expected_version`, optionally promoting it in the same write.
    async fn append_validation(
        &self,
        transfer_id: &str,
        expected_version: u64,
        signature: ValidatorSignature,
        promote_to: Option<TransferStatus>,
    ) -> Result<TransferRecord, StoreError>;

    /// Moves a VALIDATED record to COMPLETED with its target hash.
    async fn mark_completed(
        &self,
        transfer_id: &str,
        target_hash: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<TransferRecord, StoreError>;

    async fn upsert_validator(&self, bridge_id: &str, validator: ValidatorInfo) -> Result<(), StoreError>;
    async fn remove_validator(&self, bridge_id: &str, validator_id: &str) -> Result<bool, StoreError>;
    async fn get_validator(
        &self,
        bridge_id: &str,
        validator_id: &str,
    ) -> Result<Option<ValidatorInfo>, StoreError>;
    async fn list_validators(&self, bridge_id: &str) -> Result<Vec<ValidatorInfo>, StoreError>;

    async fn upsert_token(&self, bridge_id: &str, token: TokenInfo) -> Result<(), StoreError>;
    async fn remove_token(&self, bridge_id: &str, symbol: &str) -> Result<bool, StoreError>;
    async fn get_token(&self, bridge_id: &str, symbol: &str) -> Result<Option<TokenInfo>, StoreError>;
    async fn list_tokens(&self, bridge_id: &str) -> Result<Vec<TokenInfo>, StoreError>;
}
