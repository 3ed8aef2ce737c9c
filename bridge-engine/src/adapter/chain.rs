//! Chain-Backed Bridge Adapter
//!
//! Drives transfers between two chains through their `ChainClient`s. Every state
//! change goes through a conditional store write; losing such a write to another
//! engine instance is treated as the work having been done.
//!
//! Lock flow: the INITIATED record is persisted, then marked with
//! `lockSubmissionStartedAt`, then the lock is submitted. A crash anywhere in
//! between leaves a record the recovery sweep can reconcile: unmarked records are
//! resubmitted, marked ones are matched against observed lock events by transfer
//! key and failed if the lock never shows up.
//!
//! Release flow: the completion sweeper claims a VALIDATED record with a
//! version-checked metadata write, submits the release, stores its hash, and
//! completes the record once the release reaches the target confirmation depth.
//! The bridge contract refuses a second release for the same transfer key, so a
//! resubmission after an expired claim cannot pay out twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chain_clients_common::{
    transfer_key_hex, Amount, ChainClient, LockEvent, LockRequest, ReleaseRequest, TxConfirmation,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{MonitorReport, NetworkAdapter};
use crate::config::{BridgeConfig, ServiceConfig};
use crate::crypto::{self, ValidatorSigner};
use crate::error::BridgeError;
use crate::fees;
use crate::quorum::{QuorumOutcome, ValidatorQuorum};
use crate::storage::{StatusUpdate, StoreError, TransferStore};
use crate::transfer::metadata_keys as keys;
use crate::transfer::{
    BridgeHealth, FeeEstimate, HealthStatus, TokenInfo, TransactionResponse, TransferDetails,
    TransferRecord, TransferStatus, ValidatorInfo, ORIGIN_CHAIN, ORIGIN_ENGINE,
};

const DEFAULT_SCAN_WINDOW: u64 = 1_000;
const DEFAULT_LOOKBACK: u64 = 100;
const CLIENT_METADATA: &str = "client";

/// Timing and scanning knobs of one adapter.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Written into release claims
    pub instance_id: String,
    pub recovery_grace: Duration,
    pub recovery_timeout: Duration,
    pub release_timeout: Duration,
    /// Depth a release must reach before the transfer completes
    pub target_confirmations: u64,
    /// Max heights covered by one lock event query
    pub scan_window: u64,
    /// Heights behind the head the first scan starts at
    pub lookback: u64,
}

impl AdapterSettings {
    /// Service-wide timings plus the bridge's `config` overrides
    /// (`target_confirmations`, `scan_window`, `lookback`).
    pub fn from_config(service: &ServiceConfig, bridge: &BridgeConfig) -> Self {
        Self {
            instance_id: service
                .instance_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            recovery_grace: Duration::from_secs(service.recovery_grace_secs),
            recovery_timeout: Duration::from_secs(service.recovery_timeout_secs),
            release_timeout: Duration::from_secs(service.release_timeout_secs),
            target_confirmations: bridge.config_u64("target_confirmations").unwrap_or(1),
            scan_window: bridge
                .config_u64("scan_window")
                .unwrap_or(DEFAULT_SCAN_WINDOW)
                .max(1),
            lookback: bridge.config_u64("lookback").unwrap_or(DEFAULT_LOOKBACK),
        }
    }
}

pub struct ChainBridgeAdapter {
    config: BridgeConfig,
    settings: AdapterSettings,
    source: Arc<dyn ChainClient>,
    target: Arc<dyn ChainClient>,
    store: Arc<dyn TransferStore>,
    quorum: ValidatorQuorum,
    signer: Option<ValidatorSigner>,
    /// Next source height to scan; `None` until the source chain answered once
    scan_cursor: Mutex<Option<u64>>,
}

/// True when the write lost to another writer or the record went terminal.
fn lost_race(e: &StoreError) -> bool {
    e.is_conflict() || matches!(e, StoreError::Immutable(..))
}

fn older_than(at: DateTime<Utc>, age: Duration) -> bool {
    (Utc::now() - at)
        .to_std()
        .map(|elapsed| elapsed >= age)
        .unwrap_or(false)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

impl ChainBridgeAdapter {
    pub fn new(
        config: BridgeConfig,
        settings: AdapterSettings,
        source: Arc<dyn ChainClient>,
        target: Arc<dyn ChainClient>,
        store: Arc<dyn TransferStore>,
        signer: Option<ValidatorSigner>,
    ) -> Self {
        let quorum = ValidatorQuorum::new(&config.id, config.validator_threshold, store.clone());
        Self {
            config,
            settings,
            source,
            target,
            store,
            quorum,
            signer,
            scan_cursor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn id(&self) -> &str {
        &self.config.id
    }

    fn response(&self, record: &TransferRecord) -> TransactionResponse {
        TransactionResponse::from_record(
            record,
            self.config.required_confirmations,
            self.config.validator_threshold,
        )
    }

    async fn load(&self, transfer_id: &str) -> Result<TransferRecord, BridgeError> {
        match self.store.get_transfer(transfer_id).await? {
            Some(record) if record.bridge_id == self.config.id => Ok(record),
            _ => Err(BridgeError::NotFound(format!("transfer {}", transfer_id))),
        }
    }

    // ========================================================================
    // REQUEST VALIDATION
    // ========================================================================

    /// Caller-facing checks; nothing is persisted when these fail.
    async fn validate_details(&self, details: &TransferDetails) -> Result<TokenInfo, BridgeError> {
        if details.amount.is_zero() {
            return Err(BridgeError::InvalidRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
        if details.amount < self.config.min_transfer_amount {
            return Err(BridgeError::InvalidRequest(format!(
                "amount {} is below the minimum transfer amount {}",
                details.amount, self.config.min_transfer_amount
            )));
        }
        if details.amount > self.config.max_transfer_amount {
            return Err(BridgeError::InvalidRequest(format!(
                "amount {} exceeds the maximum transfer amount {}",
                details.amount, self.config.max_transfer_amount
            )));
        }
        if !self.source.is_valid_address(&details.source_address) {
            return Err(BridgeError::InvalidRequest(format!(
                "malformed source address '{}' for network {}",
                details.source_address, self.config.source_network
            )));
        }
        if !self.target.is_valid_address(&details.target_address) {
            return Err(BridgeError::InvalidRequest(format!(
                "malformed target address '{}' for network {}",
                details.target_address, self.config.target_network
            )));
        }
        match self.store.get_token(self.id(), &details.token_symbol).await? {
            Some(token) if token.active => Ok(token),
            _ => Err(BridgeError::InvalidRequest(format!(
                "token {} is not supported by bridge {}",
                details.token_symbol, self.config.id
            ))),
        }
    }

    /// Reason a lock observed on chain cannot be bridged, if any.
    fn policy_violation(&self, record: &TransferRecord) -> Option<String> {
        if !self.target.is_valid_address(&record.target_address) {
            return Some(format!(
                "malformed target address '{}' for network {}",
                record.target_address, self.config.target_network
            ));
        }
        if record.amount < self.config.min_transfer_amount
            || record.amount > self.config.max_transfer_amount
        {
            return Some(format!(
                "amount {} is outside the bridge limits [{}, {}]",
                record.amount, self.config.min_transfer_amount, self.config.max_transfer_amount
            ));
        }
        None
    }

    // ========================================================================
    // TRANSITIONS
    // ========================================================================

    /// Moves a record to FAILED, keeping the reason in metadata.
    async fn fail(
        &self,
        record: &TransferRecord,
        expected: TransferStatus,
        reason: &str,
    ) -> Result<TransferRecord, BridgeError> {
        let update = StatusUpdate::to(TransferStatus::Failed)
            .with_error(reason)
            .with_metadata(keys::FAILURE_REASON, reason)
            .with_metadata(keys::FAILED_AT, now_rfc3339());
        match self.store.update_status(&record.transfer_id, expected, update).await {
            Ok(updated) => {
                error!(
                    "Bridge {}: transfer {} {} -> {}: {}",
                    self.id(),
                    record.transfer_id,
                    expected,
                    TransferStatus::Failed,
                    reason
                );
                Ok(updated)
            }
            Err(e) if lost_race(&e) => self.load(&record.transfer_id).await,
            Err(e) => Err(e.into()),
        }
    }

    /// INITIATED -> PENDING_SOURCE_CONFIRMATION for a record whose hash is known.
    async fn mark_submitted(&self, record: &TransferRecord, source_hash: &str) -> Result<bool, BridgeError> {
        let update = StatusUpdate::to(TransferStatus::PendingSourceConfirmation)
            .with_source_hash(source_hash);
        match self
            .store
            .update_status(&record.transfer_id, TransferStatus::Initiated, update)
            .await
        {
            Ok(_) => {
                info!(
                    "Bridge {}: transfer {} {} -> {} (source tx {})",
                    self.id(),
                    record.transfer_id,
                    TransferStatus::Initiated,
                    TransferStatus::PendingSourceConfirmation,
                    source_hash
                );
                Ok(true)
            }
            Err(e) if lost_race(&e) => {
                debug!("Transfer {} already past INITIATED: {}", record.transfer_id, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks the hand-off and submits the lock for an INITIATED record.
    async fn submit_lock(&self, record: &TransferRecord, token: &TokenInfo) -> Result<TransferRecord, BridgeError> {
        let marker = StatusUpdate::fields()
            .expect_version(record.version)
            .with_metadata(keys::LOCK_SUBMISSION_STARTED_AT, now_rfc3339());
        let marked = match self
            .store
            .update_status(&record.transfer_id, TransferStatus::Initiated, marker)
            .await
        {
            Ok(marked) => marked,
            Err(e) if lost_race(&e) => {
                debug!("Lock for {} taken over concurrently: {}", record.transfer_id, e);
                return self.load(&record.transfer_id).await;
            }
            Err(e) => return Err(e.into()),
        };

        let request = LockRequest {
            transfer_id: marked.transfer_id.clone(),
            sender: marked.source_address.clone(),
            recipient: marked.target_address.clone(),
            token_address: token.source_address.clone(),
            token_decimals: token.decimals,
            amount: marked.amount,
        };

        match self.source.submit_lock(&request).await {
            Ok(hash) => match self.mark_submitted(&marked, &hash).await {
                Ok(_) => self.load(&marked.transfer_id).await,
                Err(e) => {
                    // the lock event scan reconciles the hash by transfer key
                    error!(
                        "Bridge {}: lock {} for {} submitted but not recorded: {}",
                        self.id(),
                        hash,
                        marked.transfer_id,
                        e
                    );
                    Ok(marked)
                }
            },
            Err(e) if e.is_transient() => {
                warn!(
                    "Bridge {}: lock submission for {} has an unknown outcome, left for recovery: {}",
                    self.id(),
                    marked.transfer_id,
                    e
                );
                Ok(marked)
            }
            Err(e) => {
                self.fail(
                    &marked,
                    TransferStatus::Initiated,
                    &format!("lock submission rejected: {}", e),
                )
                .await
            }
        }
    }

    // ========================================================================
    // SOURCE CHAIN
    // ========================================================================

    async fn scan_lock_events(&self, report: &mut MonitorReport) -> Result<(), BridgeError> {
        let head = self.source.current_height().await?;
        let mut cursor = self.scan_cursor.lock().await;
        let from = cursor.unwrap_or_else(|| head.saturating_sub(self.settings.lookback));
        if from > head {
            return Ok(());
        }
        let to = head.min(from.saturating_add(self.settings.scan_window.saturating_sub(1)));

        let events = self.source.lock_events(from, to).await?;
        debug!(
            "Bridge {}: {} lock events in [{}, {}]",
            self.id(),
            events.len(),
            from,
            to
        );

        let mut complete = true;
        for event in &events {
            match self.ingest_lock_event(event).await {
                Ok(true) => report.ingested += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "Bridge {}: lock event {} deferred: {}",
                        self.id(),
                        event.tx_hash,
                        e
                    );
                    report.deferred += 1;
                    complete = false;
                }
            }
        }
        // rescan the same range next cycle unless every event was handled
        if complete {
            *cursor = Some(to + 1);
        }
        Ok(())
    }

    /// Ingests one observed lock. Replaying an already-known event is a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A record was created or reconciled
    /// * `Ok(false)` - Nothing to do
    pub async fn ingest_lock_event(&self, event: &LockEvent) -> Result<bool, BridgeError> {
        if self
            .store
            .find_by_source_hash(self.id(), &event.tx_hash)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        // our own lock whose hash was never recorded
        let initiated = self
            .store
            .list_by_status(self.id(), TransferStatus::Initiated)
            .await?;
        if let Some(record) = initiated
            .iter()
            .find(|r| transfer_key_hex(&r.transfer_id).eq_ignore_ascii_case(&event.transfer_key))
        {
            let reconciled = self.mark_submitted(record, &event.tx_hash).await?;
            if reconciled {
                info!(
                    "Bridge {}: reconciled transfer {} with lock {}",
                    self.id(),
                    record.transfer_id,
                    event.tx_hash
                );
            }
            return Ok(reconciled);
        }

        let token = self
            .store
            .list_tokens(self.id())
            .await?
            .into_iter()
            .find(|t| t.active && t.source_address.eq_ignore_ascii_case(&event.token_address));
        let Some(token) = token else {
            warn!(
                "Bridge {}: ignoring lock {} of unsupported token {}",
                self.id(),
                event.tx_hash,
                event.token_address
            );
            return Ok(false);
        };
        let amount = match Amount::from_base_units(event.base_units, token.decimals) {
            Ok(amount) if !amount.is_zero() => amount,
            Ok(_) | Err(_) => {
                warn!(
                    "Bridge {}: ignoring lock {} with unusable amount {}",
                    self.id(),
                    event.tx_hash,
                    event.base_units
                );
                return Ok(false);
            }
        };

        let mut record = TransferRecord::new(
            self.id(),
            event.transfer_key.to_lowercase(),
            &self.config.source_network,
            &self.config.target_network,
            event.sender.clone(),
            event.recipient.clone(),
            amount,
            token.symbol.clone(),
        );
        record.source_transaction_hash = Some(event.tx_hash.clone());
        record.fee = fees::bridge_fee(amount, self.config.fee_percentage).ok();
        record.metadata.insert(keys::ORIGIN.to_string(), json!(ORIGIN_CHAIN));
        record
            .metadata
            .insert(keys::SOURCE_BLOCK_HEIGHT.to_string(), json!(event.height));
        record
            .metadata
            .insert(keys::SOURCE_SENDER.to_string(), json!(event.sender));

        let record = match self.store.create_transfer(record).await {
            Ok(record) => record,
            Err(e) if lost_race(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        info!(
            "Bridge {}: ingested lock {} as transfer {} ({} {})",
            self.id(),
            event.tx_hash,
            record.transfer_id,
            record.amount,
            record.token_symbol
        );

        if let Some(reason) = self.policy_violation(&record) {
            self.fail(&record, TransferStatus::Initiated, &reason).await?;
            return Ok(true);
        }
        self.mark_submitted(&record, &event.tx_hash).await?;
        Ok(true)
    }

    async fn check_source_confirmation(
        &self,
        record: &TransferRecord,
        report: &mut MonitorReport,
    ) -> Result<(), BridgeError> {
        let Some(hash) = record.source_transaction_hash.as_deref() else {
            return Ok(());
        };
        let required = self.config.required_confirmations;
        let confirmation = self.source.confirmations(hash).await?;

        if confirmation.meets(required) {
            let depth = match confirmation {
                TxConfirmation::Confirmed { confirmations, .. } => confirmations,
                _ => required,
            };
            let update = StatusUpdate::to(TransferStatus::SourceConfirmed).with_confirmations(depth);
            match self
                .store
                .update_status(&record.transfer_id, TransferStatus::PendingSourceConfirmation, update)
                .await
            {
                Ok(_) => {
                    info!(
                        "Bridge {}: transfer {} {} -> {} ({} confirmations)",
                        self.id(),
                        record.transfer_id,
                        TransferStatus::PendingSourceConfirmation,
                        TransferStatus::SourceConfirmed,
                        depth
                    );
                    report.advanced += 1;
                }
                Err(e) if lost_race(&e) => {
                    debug!("Transfer {} already confirmed elsewhere", record.transfer_id);
                }
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        match confirmation {
            TxConfirmation::Confirmed { confirmations, .. } => {
                debug!(
                    "Transfer {}: {} of {} confirmations",
                    record.transfer_id, confirmations, required
                );
                if confirmations != record.source_confirmations {
                    let update = StatusUpdate::fields().with_confirmations(confirmations);
                    if let Err(e) = self
                        .store
                        .update_status(&record.transfer_id, TransferStatus::PendingSourceConfirmation, update)
                        .await
                    {
                        if !lost_race(&e) {
                            return Err(e.into());
                        }
                    }
                }
            }
            TxConfirmation::Failed(reason) => {
                self.fail(
                    record,
                    TransferStatus::PendingSourceConfirmation,
                    &format!("source transaction failed: {}", reason),
                )
                .await?;
                report.failed += 1;
            }
            TxConfirmation::NotFound if older_than(record.initiated_at, self.settings.recovery_timeout) => {
                self.fail(
                    record,
                    TransferStatus::PendingSourceConfirmation,
                    &format!("source transaction {} was dropped", hash),
                )
                .await?;
                report.failed += 1;
            }
            TxConfirmation::NotFound | TxConfirmation::Pending => {
                debug!("Transfer {}: source tx {} not included yet", record.transfer_id, hash);
            }
        }
        Ok(())
    }

    /// Lets the local validator sign every confirmed record it has not signed.
    async fn sign_confirmed(&self, report: &mut MonitorReport) -> Result<(), BridgeError> {
        let Some(signer) = &self.signer else {
            return Ok(());
        };
        match self.store.get_validator(self.id(), signer.validator_id()).await? {
            Some(v) if v.active && v.public_key == signer.public_key_base64() => {}
            _ => return Ok(()),
        }

        let mut candidates = self
            .store
            .list_by_status(self.id(), TransferStatus::SourceConfirmed)
            .await?;
        candidates.extend(
            self.store
                .list_by_status(self.id(), TransferStatus::PendingValidation)
                .await?,
        );

        for record in candidates {
            if record.has_signature_from(signer.validator_id()) {
                continue;
            }
            let outcome = match signer.sign_transfer(&record) {
                Ok(signature) => {
                    self.quorum
                        .submit_signature(&record.transfer_id, signer.validator_id(), &signature)
                        .await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(QuorumOutcome::ReachedQuorum { .. }) => report.advanced += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Bridge {}: local signature for {} deferred: {}",
                        self.id(),
                        record.transfer_id,
                        e
                    );
                    report.deferred += 1;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // TARGET CHAIN
    // ========================================================================

    /// True when the last release claim or submission is older than the timeout.
    fn release_expired(&self, record: &TransferRecord) -> bool {
        record
            .metadata_time(keys::RELEASE_SUBMITTED_AT)
            .or_else(|| record.metadata_time(keys::RELEASE_CLAIMED_AT))
            .map(|at| older_than(at, self.settings.release_timeout))
            .unwrap_or(true)
    }

    async fn process_release(&self, record: &TransferRecord, report: &mut MonitorReport) -> Result<(), BridgeError> {
        if let Some(release_hash) = record.metadata_str(keys::RELEASE_TX_HASH) {
            let confirmation = self.target.confirmations(release_hash).await?;
            if confirmation.meets(self.settings.target_confirmations) {
                match self.complete_transfer(&record.transfer_id, release_hash).await {
                    Ok(_) => report.completed += 1,
                    Err(BridgeError::AlreadyCompleted(_)) | Err(BridgeError::InvalidTransition { .. }) => {}
                    Err(e) => return Err(e),
                }
                return Ok(());
            }
            match confirmation {
                TxConfirmation::Failed(reason) => {
                    self.fail(
                        record,
                        TransferStatus::Validated,
                        &format!("release transaction failed: {}", reason),
                    )
                    .await?;
                    report.failed += 1;
                }
                TxConfirmation::NotFound if self.release_expired(record) => {
                    warn!(
                        "Bridge {}: release {} for {} vanished, resubmitting",
                        self.id(),
                        release_hash,
                        record.transfer_id
                    );
                    self.submit_release(record, report).await?;
                }
                _ => debug!(
                    "Transfer {}: release {} not final yet",
                    record.transfer_id, release_hash
                ),
            }
            return Ok(());
        }

        if let Some(claimed_by) = record.metadata_str(keys::RELEASE_CLAIMED_BY) {
            if claimed_by != self.settings.instance_id && !self.release_expired(record) {
                debug!("Transfer {} release claimed by {}", record.transfer_id, claimed_by);
                return Ok(());
            }
        }
        self.submit_release(record, report).await
    }

    async fn submit_release(&self, record: &TransferRecord, report: &mut MonitorReport) -> Result<(), BridgeError> {
        let claim = StatusUpdate::fields()
            .expect_version(record.version)
            .with_metadata(keys::RELEASE_CLAIMED_AT, now_rfc3339())
            .with_metadata(keys::RELEASE_CLAIMED_BY, self.settings.instance_id.clone())
            .with_metadata(keys::RELEASE_TX_HASH, Value::Null)
            .with_metadata(keys::RELEASE_SUBMITTED_AT, Value::Null);
        let claimed = match self
            .store
            .update_status(&record.transfer_id, TransferStatus::Validated, claim)
            .await
        {
            Ok(claimed) => claimed,
            Err(e) if lost_race(&e) => {
                debug!("Release of {} claimed elsewhere: {}", record.transfer_id, e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let token = self
            .store
            .get_token(self.id(), &claimed.token_symbol)
            .await?
            .ok_or_else(|| BridgeError::NotFound(format!("token {}", claimed.token_symbol)))?;
        let request = ReleaseRequest {
            transfer_id: claimed.transfer_id.clone(),
            recipient: claimed.target_address.clone(),
            token_address: token.target_address.clone(),
            token_decimals: token.decimals,
            amount: claimed.amount,
            source_tx_hash: claimed.source_transaction_hash.clone().unwrap_or_default(),
        };

        match self.target.submit_release(&request).await {
            Ok(hash) => {
                info!(
                    "Bridge {}: release for {} submitted on {}: {}",
                    self.id(),
                    claimed.transfer_id,
                    self.config.target_network,
                    hash
                );
                let update = StatusUpdate::fields()
                    .expect_version(claimed.version)
                    .with_metadata(keys::RELEASE_TX_HASH, hash.clone())
                    .with_metadata(keys::RELEASE_SUBMITTED_AT, now_rfc3339());
                if let Err(e) = self
                    .store
                    .update_status(&claimed.transfer_id, TransferStatus::Validated, update)
                    .await
                {
                    if !lost_race(&e) {
                        return Err(e.into());
                    }
                    warn!(
                        "Bridge {}: release {} for {} not recorded: {}",
                        self.id(),
                        hash,
                        claimed.transfer_id,
                        e
                    );
                }
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "Bridge {}: release for {} retried next cycle: {}",
                    self.id(),
                    claimed.transfer_id,
                    e
                );
                report.deferred += 1;
            }
            Err(e) => {
                self.fail(
                    &claimed,
                    TransferStatus::Validated,
                    &format!("release rejected: {}", e),
                )
                .await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    // ========================================================================
    // RECOVERY
    // ========================================================================

    async fn recover_initiated(&self, record: &TransferRecord, report: &mut MonitorReport) -> Result<(), BridgeError> {
        if !older_than(record.initiated_at, self.settings.recovery_grace) {
            return Ok(());
        }

        if let Some(hash) = record.source_transaction_hash.as_deref() {
            if self.mark_submitted(record, hash).await? {
                report.advanced += 1;
            }
            return Ok(());
        }

        match record.metadata_time(keys::LOCK_SUBMISSION_STARTED_AT) {
            None => {
                // crashed before the lock was handed to the chain
                let token = self
                    .store
                    .get_token(self.id(), &record.token_symbol)
                    .await?
                    .filter(|t| t.active);
                let Some(token) = token else {
                    self.fail(
                        record,
                        TransferStatus::Initiated,
                        &format!("token {} is no longer supported", record.token_symbol),
                    )
                    .await?;
                    report.failed += 1;
                    return Ok(());
                };
                info!(
                    "Bridge {}: resubmitting lock for stranded transfer {}",
                    self.id(),
                    record.transfer_id
                );
                let updated = self.submit_lock(record, &token).await?;
                match updated.status {
                    TransferStatus::PendingSourceConfirmation => report.advanced += 1,
                    TransferStatus::Failed => report.failed += 1,
                    _ => report.deferred += 1,
                }
            }
            Some(started) if older_than(started, self.settings.recovery_timeout) => {
                self.fail(
                    record,
                    TransferStatus::Initiated,
                    "lock was not observed on the source chain within the recovery window",
                )
                .await?;
                report.failed += 1;
            }
            Some(_) => {
                debug!(
                    "Transfer {} awaiting its lock event on {}",
                    record.transfer_id, self.config.source_network
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// ADAPTER CONTRACT
// ============================================================================

#[async_trait]
impl NetworkAdapter for ChainBridgeAdapter {
    fn bridge_id(&self) -> &str {
        &self.config.id
    }

    async fn initialize(&self) -> Result<(), BridgeError> {
        for validator in &self.config.validators {
            crypto::decode_public_key(&validator.public_key).map_err(|e| {
                BridgeError::Configuration(format!(
                    "bridge '{}': validator {}: {}",
                    self.config.id, validator.id, e
                ))
            })?;
            self.store
                .upsert_validator(self.id(), validator.clone())
                .await?;
        }
        for token in &self.config.tokens {
            self.store.upsert_token(self.id(), token.clone()).await?;
        }

        if let Some(signer) = &self.signer {
            match self.store.get_validator(self.id(), signer.validator_id()).await? {
                Some(v) if v.public_key == signer.public_key_base64() => {
                    info!(
                        "Bridge {}: local validator {} will sign",
                        self.id(),
                        signer.validator_id()
                    );
                }
                Some(_) => {
                    return Err(BridgeError::Configuration(format!(
                        "bridge '{}': local key does not match the registered key of validator {}",
                        self.config.id,
                        signer.validator_id()
                    )));
                }
                None => warn!(
                    "Bridge {}: local validator {} is not registered and will not sign",
                    self.id(),
                    signer.validator_id()
                ),
            }
        }

        match self.source.current_height().await {
            Ok(head) => {
                *self.scan_cursor.lock().await = Some(head.saturating_sub(self.settings.lookback));
            }
            Err(e) => warn!(
                "Bridge {}: {} unreachable at startup, scanning starts on the first poll: {}",
                self.id(),
                self.config.source_network,
                e
            ),
        }

        info!(
            "Bridge {} initialized: {} -> {}, {} of {} validators required",
            self.id(),
            self.config.source_network,
            self.config.target_network,
            self.config.validator_threshold,
            self.config.validators.len()
        );
        Ok(())
    }

    async fn shutdown(&self) {
        self.source.close().await;
        self.target.close().await;
        info!("Bridge {} adapter released", self.id());
    }

    async fn get_health(&self) -> Result<BridgeHealth, BridgeError> {
        let validators = self.store.list_validators(self.id()).await?;
        let active_validators = validators.iter().filter(|v| v.active).count();
        let transfers = self.store.list_transfers(self.id()).await?;
        let pending_transactions = transfers.iter().filter(|r| !r.status.is_terminal()).count();

        let since = Utc::now() - chrono::Duration::hours(24);
        let mut volume_last_24h = Amount::ZERO;
        let mut fees_collected_last_24h = Amount::ZERO;
        let mut completion_secs: u64 = 0;
        let mut completed: u64 = 0;
        for record in transfers.iter().filter(|r| r.status == TransferStatus::Completed) {
            let Some(done) = record.completed_at else {
                continue;
            };
            completion_secs += (done - record.initiated_at).num_seconds().max(0) as u64;
            completed += 1;
            if done >= since {
                volume_last_24h = volume_last_24h.saturating_add(record.amount);
                fees_collected_last_24h =
                    fees_collected_last_24h.saturating_add(record.fee.unwrap_or(Amount::ZERO));
            }
        }
        let average_completion_time_seconds = if completed == 0 {
            0
        } else {
            completion_secs / completed
        };

        let (source_chain, target_chain) = tokio::join!(self.source.health(), self.target.health());
        let status = match (source_chain.healthy, target_chain.healthy) {
            (false, false) => HealthStatus::Down,
            (true, true) if active_validators >= self.config.validator_threshold => {
                HealthStatus::Healthy
            }
            _ => HealthStatus::Degraded,
        };

        Ok(BridgeHealth {
            status,
            active_validators,
            total_validators: validators.len(),
            pending_transactions,
            average_completion_time_seconds,
            volume_last_24h,
            fees_collected_last_24h,
            source_chain,
            target_chain,
        })
    }

    async fn get_supported_tokens(&self) -> Result<Vec<TokenInfo>, BridgeError> {
        Ok(self.store.list_tokens(self.id()).await?)
    }

    async fn get_validators(&self) -> Result<Vec<ValidatorInfo>, BridgeError> {
        Ok(self.store.list_validators(self.id()).await?)
    }

    async fn estimate_fee(&self, details: &TransferDetails) -> Result<FeeEstimate, BridgeError> {
        if details.amount.is_zero() {
            return Err(BridgeError::InvalidRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
        let (source_quote, target_quote) =
            tokio::try_join!(self.source.fee_quote(), self.target.fee_quote())?;
        fees::estimate_fee(
            details.amount,
            self.config.fee_percentage,
            &source_quote,
            &target_quote,
            self.config.required_confirmations,
        )
    }

    async fn initiate_transfer(&self, details: &TransferDetails) -> Result<TransactionResponse, BridgeError> {
        let token = self.validate_details(details).await?;

        let mut record = TransferRecord::new(
            self.id(),
            Uuid::new_v4().to_string(),
            &self.config.source_network,
            &self.config.target_network,
            details.source_address.clone(),
            details.target_address.clone(),
            details.amount,
            token.symbol.clone(),
        );
        record.fee = Some(fees::bridge_fee(details.amount, self.config.fee_percentage)?);
        record.metadata.insert(keys::ORIGIN.to_string(), json!(ORIGIN_ENGINE));
        if !details.metadata.is_empty() {
            record.metadata.insert(
                CLIENT_METADATA.to_string(),
                Value::Object(details.metadata.clone()),
            );
        }

        // durable before anything reaches the chain
        let record = self.store.create_transfer(record).await?;
        info!(
            "Bridge {}: transfer {} created ({} {} from {} to {})",
            self.id(),
            record.transfer_id,
            record.amount,
            record.token_symbol,
            record.source_address,
            record.target_address
        );

        let record = self.submit_lock(&record, &token).await?;
        Ok(self.response(&record))
    }

    async fn get_transaction_status(&self, transfer_id: &str) -> Result<TransactionResponse, BridgeError> {
        let record = self.load(transfer_id).await?;
        Ok(self.response(&record))
    }

    async fn validate_transaction(
        &self,
        transfer_id: &str,
        validator_id: &str,
        signature: &str,
    ) -> Result<QuorumOutcome, BridgeError> {
        self.quorum
            .submit_signature(transfer_id, validator_id, signature)
            .await
    }

    async fn complete_transfer(&self, transfer_id: &str, target_hash: &str) -> Result<TransactionResponse, BridgeError> {
        let record = self.load(transfer_id).await?;
        if record.status == TransferStatus::Completed {
            return Err(BridgeError::AlreadyCompleted(transfer_id.to_string()));
        }
        if target_hash.trim().is_empty() {
            return Err(BridgeError::InvalidRequest(
                "target transaction hash is empty".to_string(),
            ));
        }

        match self
            .store
            .mark_completed(transfer_id, target_hash, Utc::now())
            .await
        {
            Ok(updated) => {
                info!(
                    "Bridge {}: transfer {} {} -> {} (target tx {})",
                    self.id(),
                    transfer_id,
                    TransferStatus::Validated,
                    TransferStatus::Completed,
                    target_hash
                );
                Ok(self.response(&updated))
            }
            Err(StoreError::Immutable(_, TransferStatus::Completed)) => {
                Err(BridgeError::AlreadyCompleted(transfer_id.to_string()))
            }
            Err(StoreError::StaleStatus { actual, .. }) | Err(StoreError::Immutable(_, actual)) => {
                Err(BridgeError::InvalidTransition {
                    transfer_id: transfer_id.to_string(),
                    from: actual,
                    to: TransferStatus::Completed,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn monitor_source_chain(&self) -> Result<MonitorReport, BridgeError> {
        let mut report = MonitorReport::default();

        if let Err(e) = self.scan_lock_events(&mut report).await {
            warn!("Bridge {}: lock event scan deferred: {}", self.id(), e);
            report.deferred += 1;
        }

        let pending = self
            .store
            .list_by_status(self.id(), TransferStatus::PendingSourceConfirmation)
            .await?;
        for record in &pending {
            if let Err(e) = self.check_source_confirmation(record, &mut report).await {
                warn!(
                    "Bridge {}: confirmation check for {} deferred: {}",
                    self.id(),
                    record.transfer_id,
                    e
                );
                report.deferred += 1;
            }
        }

        self.sign_confirmed(&mut report).await?;
        Ok(report)
    }

    async fn monitor_target_chain(&self) -> Result<MonitorReport, BridgeError> {
        let mut report = MonitorReport::default();
        let validated = self
            .store
            .list_by_status(self.id(), TransferStatus::Validated)
            .await?;
        for record in &validated {
            if let Err(e) = self.process_release(record, &mut report).await {
                warn!(
                    "Bridge {}: release of {} deferred: {}",
                    self.id(),
                    record.transfer_id,
                    e
                );
                report.deferred += 1;
            }
        }
        Ok(report)
    }

    async fn sync_pending_transactions(&self) -> Result<MonitorReport, BridgeError> {
        let mut report = MonitorReport::default();
        let initiated = self
            .store
            .list_by_status(self.id(), TransferStatus::Initiated)
            .await?;
        for record in &initiated {
            if let Err(e) = self.recover_initiated(record, &mut report).await {
                warn!(
                    "Bridge {}: recovery of {} deferred: {}",
                    self.id(),
                    record.transfer_id,
                    e
                );
                report.deferred += 1;
            }
        }
        Ok(report)
    }

    async fn register_validator(&self, validator: ValidatorInfo) -> Result<(), BridgeError> {
        if validator.id.trim().is_empty() {
            return Err(BridgeError::InvalidRequest("validator id is empty".to_string()));
        }
        crypto::decode_public_key(&validator.public_key)?;
        info!("Bridge {}: registered validator {}", self.id(), validator.id);
        self.store.upsert_validator(self.id(), validator).await?;
        Ok(())
    }

    async fn remove_validator(&self, validator_id: &str) -> Result<bool, BridgeError> {
        let removed = self.store.remove_validator(self.id(), validator_id).await?;
        if removed {
            info!("Bridge {}: removed validator {}", self.id(), validator_id);
        }
        Ok(removed)
    }

    async fn cancel_transfer(&self, transfer_id: &str, reason: &str) -> Result<TransactionResponse, BridgeError> {
        let record = self.load(transfer_id).await?;
        let invalid = |from| BridgeError::InvalidTransition {
            transfer_id: transfer_id.to_string(),
            from,
            to: TransferStatus::Cancelled,
        };
        if record.status != TransferStatus::Initiated
            || record.source_transaction_hash.is_some()
            || record.metadata_str(keys::LOCK_SUBMISSION_STARTED_AT).is_some()
        {
            return Err(invalid(record.status));
        }

        let update = StatusUpdate::to(TransferStatus::Cancelled)
            .expect_version(record.version)
            .with_metadata(keys::CANCEL_REASON, reason);
        match self
            .store
            .update_status(transfer_id, TransferStatus::Initiated, update)
            .await
        {
            Ok(updated) => {
                info!(
                    "Bridge {}: transfer {} {} -> {}: {}",
                    self.id(),
                    transfer_id,
                    TransferStatus::Initiated,
                    TransferStatus::Cancelled,
                    reason
                );
                Ok(self.response(&updated))
            }
            // the record changed since we looked; a submission may have started
            Err(StoreError::VersionConflict { .. }) => Err(invalid(TransferStatus::Initiated)),
            Err(StoreError::StaleStatus { actual, .. }) | Err(StoreError::Immutable(_, actual)) => {
                Err(invalid(actual))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dispute_transfer(&self, transfer_id: &str, reason: &str) -> Result<TransactionResponse, BridgeError> {
        if reason.trim().is_empty() {
            return Err(BridgeError::InvalidRequest("dispute reason is empty".to_string()));
        }
        let record = self.load(transfer_id).await?;
        let invalid = |from| BridgeError::InvalidTransition {
            transfer_id: transfer_id.to_string(),
            from,
            to: TransferStatus::Disputed,
        };
        if record.status != TransferStatus::Validated {
            return Err(invalid(record.status));
        }

        let update = StatusUpdate::to(TransferStatus::Disputed)
            .with_metadata(keys::DISPUTE_REASON, reason)
            .with_metadata(keys::DISPUTED_AT, now_rfc3339());
        match self
            .store
            .update_status(transfer_id, TransferStatus::Validated, update)
            .await
        {
            Ok(updated) => {
                warn!(
                    "Bridge {}: transfer {} {} -> {}: {}",
                    self.id(),
                    transfer_id,
                    TransferStatus::Validated,
                    TransferStatus::Disputed,
                    reason
                );
                Ok(self.response(&updated))
            }
            Err(StoreError::StaleStatus { actual, .. }) | Err(StoreError::Immutable(_, actual)) => {
                Err(invalid(actual))
            }
            Err(e) => Err(e.into()),
        }
    }
}
