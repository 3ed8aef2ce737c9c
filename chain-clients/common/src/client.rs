//! Chain Client Contract
//!
//! The one trait every chain backend implements. The bridge engine holds clients as
//! `Arc<dyn ChainClient>` and never branches on the concrete chain type.

use async_trait::async_trait;

use crate::error::ChainError;
use crate::types::{
    ChainHealth, FinalityModel, LockEvent, LockRequest, NetworkFeeQuote, ReleaseRequest,
    TxConfirmation,
};

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Network identifier this client is connected to
    fn network_id(&self) -> &str;

    fn finality_model(&self) -> FinalityModel;

    /// Average seconds between blocks / slots / epochs
    fn block_time_secs(&self) -> u64;

    /// Checks address syntax for this chain.
    fn is_valid_address(&self, address: &str) -> bool;

    /// Current chain head height.
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Submits a lock and returns the transaction identifier.
    async fn submit_lock(&self, request: &LockRequest) -> Result<String, ChainError>;

    /// Submits a release and returns the transaction identifier.
    ///
    /// The bridge contract rejects a second release for the same transfer key, so
    /// resubmitting after an ambiguous outcome cannot pay out twice.
    async fn submit_release(&self, request: &ReleaseRequest) -> Result<String, ChainError>;

    /// Reports inclusion and depth of a transaction.
    async fn confirmations(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError>;

    /// Lock events included in heights `[from_height, to_height]`.
    async fn lock_events(
        &self,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<LockEvent>, ChainError>;

    /// Current network fee for one bridge message.
    async fn fee_quote(&self) -> Result<NetworkFeeQuote, ChainError>;

    async fn health(&self) -> ChainHealth;

    /// Releases connections and subscriptions. Called once on bridge shutdown.
    async fn close(&self) {}
}

impl std::fmt::Debug for dyn ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("network_id", &self.network_id())
            .finish_non_exhaustive()
    }
}
