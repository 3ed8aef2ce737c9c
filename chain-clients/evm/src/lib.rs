//! EVM chain client
//!
//! Bridge backend for account-model chains and the settlement chain.

pub mod abi;
pub mod client;

pub use client::{is_evm_address, EvmBridgeClient, EvmLog};
