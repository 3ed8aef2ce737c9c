//! Chain Error Taxonomy
//!
//! Every chain client reports failures through [`ChainError`]. The bridge engine only
//! needs to know one thing about a failure: whether retrying next cycle can help
//! (transient) or whether the chain has given a final answer (terminal).

use thiserror::Error;

/// JSON-RPC error codes that nodes use for overload or internal hiccups.
const TRANSIENT_RPC_CODES: &[i64] = &[-32005, -32603, 429, 502, 503, 504];

/// Errors raised by chain clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Connection refused, reset, DNS failure or a 5xx from a gateway
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The request exceeded its timeout budget
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// The node answered with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The chain refused the transaction (revert, bad nonce, invalid params)
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The submitting account cannot pay for the transaction
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The node answered with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The client was built with unusable settings
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ChainError {
    /// Classifies a JSON-RPC error object returned by a node.
    ///
    /// Funding and revert messages are terminal regardless of code; well-known
    /// overload codes stay as retryable RPC errors.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
            ChainError::InsufficientFunds(message)
        } else if lower.contains("revert") || lower.contains("nonce too low") {
            ChainError::Rejected(message)
        } else {
            ChainError::Rpc { code, message }
        }
    }

    /// Returns true when the same call may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Transport { .. } | ChainError::Timeout { .. } => true,
            ChainError::InvalidResponse(_) => true,
            ChainError::Rpc { code, .. } => TRANSIENT_RPC_CODES.contains(code),
            ChainError::Rejected(_)
            | ChainError::InsufficientFunds(_)
            | ChainError::Configuration(_) => false,
        }
    }
}
