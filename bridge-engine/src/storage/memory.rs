//! In-Memory Transfer Store
//!
//! Process-local implementation of [`TransferStore`]. Transfers and the source
//! hash index share one lock so that every conditional update and uniqueness
//! check is atomic. Suitable for a single-process deployment and for tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{StatusUpdate, StoreError, TransferStore};
use crate::transfer::{TokenInfo, TransferRecord, TransferStatus, ValidatorInfo, ValidatorSignature};

#[derive(Default)]
struct TransferTable {
    /// transfer_id -> record
    records: HashMap<String, TransferRecord>,
    /// (bridge_id, source hash) -> transfer_id
    source_index: HashMap<(String, String), String>,
}

/// In-memory transfer, validator and token storage.
#[derive(Default)]
pub struct InMemoryTransferStore {
    transfers: RwLock<TransferTable>,
    /// bridge_id -> validator_id -> validator
    validators: RwLock<HashMap<String, BTreeMap<String, ValidatorInfo>>>,
    /// bridge_id -> symbol -> token
    tokens: RwLock<HashMap<String, BTreeMap<String, TokenInfo>>>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut records: Vec<TransferRecord>) -> Vec<TransferRecord> {
        records.sort_by(|a, b| {
            a.initiated_at
                .cmp(&b.initiated_at)
                .then_with(|| a.transfer_id.cmp(&b.transfer_id))
        });
        records
    }
}

/// Rejects writes to terminal records and writes based on a stale status.
fn check_writable(record: &TransferRecord, expected: TransferStatus) -> Result<(), StoreError> {
    if record.status.is_terminal() {
        return Err(StoreError::Immutable(record.transfer_id.clone(), record.status));
    }
    if record.status != expected {
        return Err(StoreError::StaleStatus {
            transfer_id: record.transfer_id.clone(),
            expected,
            actual: record.status,
        });
    }
    Ok(())
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn create_transfer(&self, mut record: TransferRecord) -> Result<TransferRecord, StoreError> {
        if record.status != TransferStatus::Initiated {
            return Err(StoreError::InvalidRecord(format!(
                "new transfer {} must be {}, got {}",
                record.transfer_id,
                TransferStatus::Initiated,
                record.status
            )));
        }
        if record.amount.is_zero() {
            return Err(StoreError::InvalidRecord(format!(
                "transfer {} has a zero amount",
                record.transfer_id
            )));
        }

        let mut table = self.transfers.write().await;
        if table.records.contains_key(&record.transfer_id) {
            return Err(StoreError::DuplicateTransfer(record.transfer_id));
        }
        if let Some(hash) = &record.source_transaction_hash {
            let key = (record.bridge_id.clone(), hash.clone());
            if table.source_index.contains_key(&key) {
                return Err(StoreError::DuplicateSourceHash(hash.clone()));
            }
            table.source_index.insert(key, record.transfer_id.clone());
        }

        record.version = 0;
        table.records.insert(record.transfer_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_transfer(&self, transfer_id: &str) -> Result<Option<TransferRecord>, StoreError> {
        let table = self.transfers.read().await;
        Ok(table.records.get(transfer_id).cloned())
    }

    async fn find_by_source_hash(
        &self,
        bridge_id: &str,
        source_hash: &str,
    ) -> Result<Option<TransferRecord>, StoreError> {
        let table = self.transfers.read().await;
        let key = (bridge_id.to_string(), source_hash.to_string());
        Ok(table
            .source_index
            .get(&key)
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn list_by_status(
        &self,
        bridge_id: &str,
        status: TransferStatus,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let table = self.transfers.read().await;
        Ok(Self::sorted(
            table
                .records
                .values()
                .filter(|r| r.bridge_id == bridge_id && r.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_transfers(&self, bridge_id: &str) -> Result<Vec<TransferRecord>, StoreError> {
        let table = self.transfers.read().await;
        Ok(Self::sorted(
            table
                .records
                .values()
                .filter(|r| r.bridge_id == bridge_id)
                .cloned()
                .collect(),
        ))
    }

    async fn update_status(
        &self,
        transfer_id: &str,
        expected: TransferStatus,
        update: StatusUpdate,
    ) -> Result<TransferRecord, StoreError> {
        let mut guard = self.transfers.write().await;
        let TransferTable {
            records,
            source_index,
        } = &mut *guard;
        let record = records
            .get_mut(transfer_id)
            .ok_or_else(|| StoreError::NotFound(transfer_id.to_string()))?;

        check_writable(record, expected)?;
        if let Some(version) = update.expected_version {
            if version != record.version {
                return Err(StoreError::VersionConflict {
                    transfer_id: transfer_id.to_string(),
                    expected: version,
                    actual: record.version,
                });
            }
        }
        if let Some(next) = update.new_status {
            if !record.status.can_transition_to(next) {
                return Err(StoreError::IllegalTransition {
                    transfer_id: transfer_id.to_string(),
                    from: record.status,
                    to: next,
                });
            }
        }

        let mut index_entry = None;
        if let Some(hash) = &update.source_transaction_hash {
            match &record.source_transaction_hash {
                Some(existing) if existing != hash => {
                    return Err(StoreError::SourceHashAlreadySet(transfer_id.to_string()));
                }
                Some(_) => {}
                None => {
                    let key = (record.bridge_id.clone(), hash.clone());
                    if source_index.contains_key(&key) {
                        return Err(StoreError::DuplicateSourceHash(hash.clone()));
                    }
                    index_entry = Some(key);
                }
            }
        }

        // all checks passed; apply
        if let Some(key) = index_entry {
            source_index.insert(key, transfer_id.to_string());
        }
        if let Some(hash) = update.source_transaction_hash {
            record.source_transaction_hash = Some(hash);
        }
        if let Some(next) = update.new_status {
            record.status = next;
        }
        if let Some(confirmations) = update.source_confirmations {
            record.source_confirmations = confirmations;
        }
        for (key, value) in update.metadata {
            if value.is_null() {
                record.metadata.remove(&key);
            } else {
                record.metadata.insert(key, value);
            }
        }
        if let Some(message) = update.error_message {
            record.error_message = Some(message);
        }
        record.version += 1;
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn append_validation(
        &self,
        transfer_id: &str,
        expected_version: u64,
        signature: ValidatorSignature,
        promote_to: Option<TransferStatus>,
    ) -> Result<TransferRecord, StoreError> {
        let mut table = self.transfers.write().await;
        let record = table
            .records
            .get_mut(transfer_id)
            .ok_or_else(|| StoreError::NotFound(transfer_id.to_string()))?;

        check_writable(record, TransferStatus::PendingValidation)?;
        if record.version != expected_version {
            return Err(StoreError::VersionConflict {
                transfer_id: transfer_id.to_string(),
                expected: expected_version,
                actual: record.version,
            });
        }
        if record.has_signature_from(&signature.validator_id) {
            return Err(StoreError::DuplicateValidation {
                transfer_id: transfer_id.to_string(),
                validator_id: signature.validator_id,
            });
        }
        if let Some(next) = promote_to {
            if !record.status.can_transition_to(next) {
                return Err(StoreError::IllegalTransition {
                    transfer_id: transfer_id.to_string(),
                    from: record.status,
                    to: next,
                });
            }
        }

        record.validations.push(signature);
        if let Some(next) = promote_to {
            record.status = next;
        }
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn mark_completed(
        &self,
        transfer_id: &str,
        target_hash: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<TransferRecord, StoreError> {
        let mut table = self.transfers.write().await;
        let record = table
            .records
            .get_mut(transfer_id)
            .ok_or_else(|| StoreError::NotFound(transfer_id.to_string()))?;

        check_writable(record, TransferStatus::Validated)?;

        record.status = TransferStatus::Completed;
        record.target_transaction_hash = Some(target_hash.to_string());
        record.completed_at = Some(completed_at);
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn upsert_validator(&self, bridge_id: &str, validator: ValidatorInfo) -> Result<(), StoreError> {
        let mut validators = self.validators.write().await;
        validators
            .entry(bridge_id.to_string())
            .or_default()
            .insert(validator.id.clone(), validator);
        Ok(())
    }

    async fn remove_validator(&self, bridge_id: &str, validator_id: &str) -> Result<bool, StoreError> {
        let mut validators = self.validators.write().await;
        Ok(validators
            .get_mut(bridge_id)
            .map(|set| set.remove(validator_id).is_some())
            .unwrap_or(false))
    }

    async fn get_validator(
        &self,
        bridge_id: &str,
        validator_id: &str,
    ) -> Result<Option<ValidatorInfo>, StoreError> {
        let validators = self.validators.read().await;
        Ok(validators
            .get(bridge_id)
            .and_then(|set| set.get(validator_id))
            .cloned())
    }

    async fn list_validators(&self, bridge_id: &str) -> Result<Vec<ValidatorInfo>, StoreError> {
        let validators = self.validators.read().await;
        Ok(validators
            .get(bridge_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_token(&self, bridge_id: &str, token: TokenInfo) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().await;
        tokens
            .entry(bridge_id.to_string())
            .or_default()
            .insert(token.symbol.clone(), token);
        Ok(())
    }

    async fn remove_token(&self, bridge_id: &str, symbol: &str) -> Result<bool, StoreError> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens
            .get_mut(bridge_id)
            .map(|set| set.remove(symbol).is_some())
            .unwrap_or(false))
    }

    async fn get_token(&self, bridge_id: &str, symbol: &str) -> Result<Option<TokenInfo>, StoreError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(bridge_id).and_then(|set| set.get(symbol)).cloned())
    }

    async fn list_tokens(&self, bridge_id: &str) -> Result<Vec<TokenInfo>, StoreError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(bridge_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default())
    }
}
