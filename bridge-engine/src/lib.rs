//! Cross-Chain Bridge Engine Library
//!
//! Moves token value between two chains: a lock on the source chain is observed,
//! confirmed, attested by M of N validators, and released on the target chain.
//! Each configured bridge runs its own engine with a source monitor and a
//! completion sweeper; the transfer store is the single record of progress.

pub mod adapter;
pub mod api;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod fees;
pub mod monitor;
pub mod quorum;
pub mod registry;
pub mod storage;
pub mod transfer;

// Re-export commonly used types
pub use adapter::{AdapterSettings, ChainBridgeAdapter, MonitorReport, NetworkAdapter};
pub use config::{ApiConfig, BridgeConfig, Config, NetworkConfig, ServiceConfig};
pub use engine::{BridgeEngine, EngineSettings};
pub use error::BridgeError;
pub use quorum::{QuorumOutcome, ValidatorQuorum};
pub use registry::{AdapterTable, BridgeRegistry};
pub use storage::{InMemoryTransferStore, StatusUpdate, StoreError, TransferStore};
pub use transfer::{
    BridgeHealth, FeeEstimate, HealthStatus, TokenInfo, TransactionResponse, TransferDetails,
    TransferRecord, TransferStatus, ValidatorInfo,
};
