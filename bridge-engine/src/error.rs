//! Bridge Error Taxonomy
//!
//! One error type for every operation the engine exposes. Callers only ever see
//! configuration and request errors directly; chain and store failures are absorbed
//! by the monitor loops and show up later through the transfer status.

use chain_clients_common::ChainError;
use thiserror::Error;

use crate::storage::StoreError;
use crate::transfer::TransferStatus;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Unsupported network, missing contract address, bad key material
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-facing validation failure (malformed address, amount out of range)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("transfer {transfer_id} cannot move from {from} to {to}")]
    InvalidTransition {
        transfer_id: String,
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("transfer {0} is already completed")]
    AlreadyCompleted(String),

    /// Signature from an unregistered or inactive validator, or one that fails verification
    #[error("validation rejected: {0}")]
    ValidationRejected(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BridgeError {
    /// True when the error is the caller's fault and retrying the same request
    /// will not help.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidRequest(_)
                | BridgeError::NotFound(_)
                | BridgeError::InvalidTransition { .. }
                | BridgeError::AlreadyCompleted(_)
                | BridgeError::ValidationRejected(_)
        )
    }
}
