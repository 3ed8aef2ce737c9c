//! Bridge Engine
//!
//! Per-bridge orchestrator. Owns the adapter, runs its two monitor loops under a
//! cancellation token, and is the entry point for every caller-facing operation
//! on one bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::{MonitorReport, NetworkAdapter};
use crate::config::{BridgeConfig, ServiceConfig};
use crate::error::BridgeError;
use crate::monitor::{self, LoopKind};
use crate::quorum::QuorumOutcome;
use crate::transfer::{
    BridgeHealth, FeeEstimate, TokenInfo, TransactionResponse, TransferDetails, ValidatorInfo,
};

/// Loop periods and the shutdown bound.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub source_poll_interval: Duration,
    pub target_poll_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl From<&ServiceConfig> for EngineSettings {
    fn from(service: &ServiceConfig) -> Self {
        Self {
            source_poll_interval: service.source_poll_interval(),
            target_poll_interval: service.target_poll_interval(),
            shutdown_timeout: service.shutdown_timeout(),
        }
    }
}

pub struct BridgeEngine {
    config: BridgeConfig,
    adapter: Arc<dyn NetworkAdapter>,
    settings: EngineSettings,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for BridgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeEngine")
            .field("id", &self.config.id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BridgeEngine {
    pub fn new(config: BridgeConfig, adapter: Arc<dyn NetworkAdapter>, settings: EngineSettings) -> Self {
        Self {
            config,
            adapter,
            settings,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Spawns the source monitor and the completion sweeper. Calling it on a
    /// running or stopped engine does nothing.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() || self.cancel.is_cancelled() {
            return;
        }
        tasks.push(monitor::spawn_loop(
            LoopKind::Source,
            self.adapter.clone(),
            self.settings.source_poll_interval,
            self.cancel.child_token(),
        ));
        tasks.push(monitor::spawn_loop(
            LoopKind::Completion,
            self.adapter.clone(),
            self.settings.target_poll_interval,
            self.cancel.child_token(),
        ));
        info!("Bridge {} started", self.id());
    }

    pub async fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tasks.lock().await.is_empty()
    }

    /// Stops both loops, waiting at most the configured bound for each, then
    /// releases the adapter.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        monitor::join_bounded(handles, self.settings.shutdown_timeout).await;
        self.adapter.shutdown().await;
        info!("Bridge {} stopped", self.id());
    }

    // ========================================================================
    // CALLER OPERATIONS
    // ========================================================================

    pub async fn initiate_transfer(&self, details: &TransferDetails) -> Result<TransactionResponse, BridgeError> {
        let result = self.adapter.initiate_transfer(details).await;
        if let Err(e) = &result {
            warn!("Bridge {}: transfer request rejected: {}", self.id(), e);
        }
        result
    }

    pub async fn get_transaction_status(&self, transfer_id: &str) -> Result<TransactionResponse, BridgeError> {
        self.adapter.get_transaction_status(transfer_id).await
    }

    pub async fn estimate_fee(&self, details: &TransferDetails) -> Result<FeeEstimate, BridgeError> {
        self.adapter.estimate_fee(details).await
    }

    pub async fn get_health(&self) -> Result<BridgeHealth, BridgeError> {
        self.adapter.get_health().await
    }

    pub async fn get_supported_tokens(&self) -> Result<Vec<TokenInfo>, BridgeError> {
        self.adapter.get_supported_tokens().await
    }

    pub async fn get_validators(&self) -> Result<Vec<ValidatorInfo>, BridgeError> {
        self.adapter.get_validators().await
    }

    /// Remote validator signature for a transfer.
    pub async fn submit_validation(
        &self,
        transfer_id: &str,
        validator_id: &str,
        signature: &str,
    ) -> Result<QuorumOutcome, BridgeError> {
        self.adapter
            .validate_transaction(transfer_id, validator_id, signature)
            .await
    }

    pub async fn complete_transfer(&self, transfer_id: &str, target_hash: &str) -> Result<TransactionResponse, BridgeError> {
        self.adapter.complete_transfer(transfer_id, target_hash).await
    }

    pub async fn cancel_transfer(&self, transfer_id: &str, reason: &str) -> Result<TransactionResponse, BridgeError> {
        self.adapter.cancel_transfer(transfer_id, reason).await
    }

    pub async fn dispute_transfer(&self, transfer_id: &str, reason: &str) -> Result<TransactionResponse, BridgeError> {
        self.adapter.dispute_transfer(transfer_id, reason).await
    }

    pub async fn register_validator(&self, validator: ValidatorInfo) -> Result<(), BridgeError> {
        self.adapter.register_validator(validator).await
    }

    pub async fn remove_validator(&self, validator_id: &str) -> Result<bool, BridgeError> {
        self.adapter.remove_validator(validator_id).await
    }

    /// Runs the recovery sweep once, outside the loop schedule.
    pub async fn sync_pending_transactions(&self) -> Result<MonitorReport, BridgeError> {
        self.adapter.sync_pending_transactions().await
    }
}
