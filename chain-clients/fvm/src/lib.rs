//! FVM chain client
//!
//! Bridge backend for the content-addressed-storage chain (Lotus JSON-RPC).

pub mod client;

pub use client::{is_fvm_address, BridgeParams, Cid, FvmBridgeClient};
