//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    build_test_bridge, build_test_bridge_config, build_test_bridge_with, build_test_config,
    build_test_registry, create_validators, drive_to_validated, dummy_token, initiate, lock_event,
    mock_adapter_table, test_adapter_settings, test_engine_settings, transfer_details,
    MockChainClient, TestBridge, TestRegistry, TestValidator, MOCK_KIND,
    DUMMY_BRIDGE_ID, DUMMY_CONTRACT_SOURCE, DUMMY_CONTRACT_TARGET, DUMMY_LOCK_TX,
    DUMMY_REQUIRED_CONFIRMATIONS, DUMMY_SOURCE_ADDR, DUMMY_SOURCE_NETWORK, DUMMY_TARGET_ADDR,
    DUMMY_TARGET_NETWORK, DUMMY_TOKEN_ADDR_SOURCE, DUMMY_TOKEN_ADDR_TARGET, DUMMY_TOKEN_DECIMALS,
    DUMMY_TOKEN_SYMBOL, DUMMY_TRANSFER_KEY,
};
