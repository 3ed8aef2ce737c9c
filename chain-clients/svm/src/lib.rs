//! SVM chain client
//!
//! Bridge backend for high-throughput Solana-style chains.

pub mod client;
pub mod instruction;

pub use client::SvmBridgeClient;
