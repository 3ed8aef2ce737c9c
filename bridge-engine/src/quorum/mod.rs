//! Validator Quorum
//!
//! Collects validator signatures for a transfer and decides when M of N have
//! been reached. A signature is only appended after it verifies against the
//! validator's registered public key. Only validations from validators that
//! are still registered and active count toward the threshold. The append that
//! brings that count to the threshold also promotes the record to VALIDATED, in
//! the same conditional write.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto;
use crate::error::BridgeError;
use crate::storage::{StatusUpdate, StoreError, TransferStore};
use crate::transfer::{TransferRecord, TransferStatus, ValidatorSignature};

/// Attempts per submission before giving up on a contended record.
const MAX_APPEND_ATTEMPTS: u32 = 8;

/// Result of a signature submission that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuorumOutcome {
    /// Stored; quorum not reached yet
    Accepted { signatures: usize, threshold: usize },
    /// Stored, and this signature completed the quorum
    ReachedQuorum { signatures: usize },
    /// This validator had already signed; nothing changed
    Duplicate,
    /// The record already passed validation; nothing changed
    AlreadyValidated,
}

pub struct ValidatorQuorum {
    bridge_id: String,
    threshold: usize,
    store: Arc<dyn TransferStore>,
}

impl ValidatorQuorum {
    pub fn new(bridge_id: &str, threshold: usize, store: Arc<dyn TransferStore>) -> Self {
        Self {
            bridge_id: bridge_id.to_string(),
            threshold,
            store,
        }
    }

    /// Verifies and records one validator signature.
    ///
    /// Opens the signing round (SOURCE_CONFIRMED -> PENDING_VALIDATION) when it
    /// is the first signature. Lost races against concurrent appends are retried
    /// on a fresh read, never overwritten.
    ///
    /// # Arguments
    ///
    /// * `transfer_id` - Transfer being attested
    /// * `validator_id` - Registered validator of this bridge
    /// * `signature_b64` - Base64 Ed25519 signature over the transfer digest
    ///
    /// # Returns
    ///
    /// * `Ok(QuorumOutcome)` - Signature stored, or a harmless no-op
    /// * `Err(BridgeError::ValidationRejected)` - Unregistered / inactive validator,
    ///   bad signature, or transfer not in a signable state
    pub async fn submit_signature(
        &self,
        transfer_id: &str,
        validator_id: &str,
        signature_b64: &str,
    ) -> Result<QuorumOutcome, BridgeError> {
        let validator = match self.store.get_validator(&self.bridge_id, validator_id).await? {
            Some(v) if v.active => v,
            Some(_) => return Err(self.reject(transfer_id, validator_id, "validator is inactive")),
            None => return Err(self.reject(transfer_id, validator_id, "validator is not registered")),
        };

        let mut last_conflict = None;
        for _ in 0..MAX_APPEND_ATTEMPTS {
            let record = self.load(transfer_id).await?;

            match record.status {
                TransferStatus::PendingValidation => {}
                TransferStatus::SourceConfirmed => {
                    self.open_round(&record).await?;
                    continue;
                }
                TransferStatus::Validated | TransferStatus::Completed => {
                    debug!(
                        "Ignoring signature from {} for {}: already {}",
                        validator_id, transfer_id, record.status
                    );
                    return Ok(QuorumOutcome::AlreadyValidated);
                }
                other => {
                    let reason = format!("transfer is {}", other);
                    return Err(self.reject(transfer_id, validator_id, &reason));
                }
            }

            let digest = crypto::record_digest(&record)?;
            if let Err(e) = crypto::verify_signature(&validator.public_key, &digest, signature_b64) {
                return Err(self.reject(transfer_id, validator_id, &e.to_string()));
            }

            if record.has_signature_from(validator_id) {
                return Ok(QuorumOutcome::Duplicate);
            }

            let signatures = self.counted_signatures(&record).await? + 1;
            let promote_to = (signatures >= self.threshold).then_some(TransferStatus::Validated);
            let signature = ValidatorSignature {
                validator_id: validator_id.to_string(),
                signature: signature_b64.to_string(),
                signed_at: Utc::now(),
            };

            match self
                .store
                .append_validation(transfer_id, record.version, signature, promote_to)
                .await
            {
                Ok(updated) => {
                    return Ok(if updated.status == TransferStatus::Validated {
                        info!(
                            "Bridge {}: transfer {} {} -> {} ({} of {} signatures)",
                            self.bridge_id,
                            transfer_id,
                            TransferStatus::PendingValidation,
                            TransferStatus::Validated,
                            signatures,
                            self.threshold
                        );
                        QuorumOutcome::ReachedQuorum { signatures }
                    } else {
                        info!(
                            "Bridge {}: transfer {} signed by {} ({} of {})",
                            self.bridge_id, transfer_id, validator_id, signatures, self.threshold
                        );
                        QuorumOutcome::Accepted {
                            signatures,
                            threshold: self.threshold,
                        }
                    });
                }
                Err(StoreError::DuplicateValidation { .. }) => return Ok(QuorumOutcome::Duplicate),
                Err(e) if e.is_conflict() => {
                    debug!("Append for {} lost a race, retrying: {}", transfer_id, e);
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .map(BridgeError::Store)
            .unwrap_or_else(|| BridgeError::NotFound(format!("transfer {}", transfer_id))))
    }

    async fn load(&self, transfer_id: &str) -> Result<TransferRecord, BridgeError> {
        match self.store.get_transfer(transfer_id).await? {
            Some(record) if record.bridge_id == self.bridge_id => Ok(record),
            _ => Err(BridgeError::NotFound(format!("transfer {}", transfer_id))),
        }
    }

    /// Stored validations whose signer is still a registered, active validator.
    async fn counted_signatures(&self, record: &TransferRecord) -> Result<usize, BridgeError> {
        let active: HashSet<String> = self
            .store
            .list_validators(&self.bridge_id)
            .await?
            .into_iter()
            .filter(|v| v.active)
            .map(|v| v.id)
            .collect();
        Ok(record
            .validations
            .iter()
            .filter(|v| active.contains(&v.validator_id))
            .count())
    }

    /// SOURCE_CONFIRMED -> PENDING_VALIDATION. Losing the race to another
    /// signer is fine; the caller re-reads either way.
    async fn open_round(&self, record: &TransferRecord) -> Result<(), BridgeError> {
        match self
            .store
            .update_status(
                &record.transfer_id,
                TransferStatus::SourceConfirmed,
                StatusUpdate::to(TransferStatus::PendingValidation),
            )
            .await
        {
            Ok(_) => {
                info!(
                    "Bridge {}: transfer {} {} -> {}",
                    self.bridge_id,
                    record.transfer_id,
                    TransferStatus::SourceConfirmed,
                    TransferStatus::PendingValidation
                );
                Ok(())
            }
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn reject(&self, transfer_id: &str, validator_id: &str, reason: &str) -> BridgeError {
        warn!(
            "Bridge {}: rejected signature from {} for {}: {}",
            self.bridge_id, validator_id, transfer_id, reason
        );
        BridgeError::ValidationRejected(format!("{}: {}", validator_id, reason))
    }
}
