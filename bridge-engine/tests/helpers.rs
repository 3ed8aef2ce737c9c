//! Shared test helpers for bridge engine tests
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy ids, addresses and token data
//! - **Mock Chain Client**: A scripted `ChainClient` whose chain state tests drive directly
//! - **Configuration Builders**: Bridge configs, adapter settings, validator key pairs
//! - **Bridge Builders**: Initialized adapters and engines over an in-memory store
//! - **Registry Builders**: A registry whose adapter table serves the mock clients

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_engine::adapter::{AdapterSettings, ChainBridgeAdapter, NetworkAdapter};
use bridge_engine::config::{ApiConfig, BridgeConfig, Config, NetworkConfig, SecurityLevel, ServiceConfig};
use bridge_engine::crypto::{generate_keypair, ValidatorSigner};
use bridge_engine::engine::{BridgeEngine, EngineSettings};
use bridge_engine::registry::{AdapterTable, BridgeRegistry};
use bridge_engine::storage::{InMemoryTransferStore, TransferStore};
use bridge_engine::transfer::{TokenInfo, TransferDetails, TransferRecord, TransferStatus, ValidatorInfo};
use chain_clients_common::{
    Amount, ChainClient, ChainError, ChainHealth, ClientSpec, FinalityModel, LockEvent,
    LockRequest, NetworkFeeQuote, ReleaseRequest, TxConfirmation,
};
use serde_json::Map;

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- BRIDGE --------------------------------

/// Dummy bridge id
pub const DUMMY_BRIDGE_ID: &str = "eth-sol";

/// Dummy source network id
pub const DUMMY_SOURCE_NETWORK: &str = "ethereum";

/// Dummy target network id
pub const DUMMY_TARGET_NETWORK: &str = "solana";

/// Dummy bridge contract on the source network
pub const DUMMY_CONTRACT_SOURCE: &str = "0x00000000000000000000000000000000000000b1";

/// Dummy bridge program on the target network
pub const DUMMY_CONTRACT_TARGET: &str = "0x00000000000000000000000000000000000000b2";

/// Source confirmations required by the dummy bridge
pub const DUMMY_REQUIRED_CONFIRMATIONS: u64 = 12;

// -------------------------------- USERS ---------------------------------

/// Dummy depositor address on the source chain
pub const DUMMY_SOURCE_ADDR: &str = "0x0000000000000000000000000000000000000005";

/// Dummy beneficiary address on the target chain
pub const DUMMY_TARGET_ADDR: &str = "0x0000000000000000000000000000000000000006";

// -------------------------------- TOKENS --------------------------------

/// Dummy token symbol
pub const DUMMY_TOKEN_SYMBOL: &str = "USDC";

/// Dummy token decimals
pub const DUMMY_TOKEN_DECIMALS: u32 = 6;

/// Dummy token contract on the source chain
pub const DUMMY_TOKEN_ADDR_SOURCE: &str = "0x00000000000000000000000000000000000000a1";

/// Dummy token contract on the target chain
pub const DUMMY_TOKEN_ADDR_TARGET: &str = "0x00000000000000000000000000000000000000a2";

// ----------------------------- TRANSACTIONS -----------------------------

/// Dummy lock transaction hash
pub const DUMMY_LOCK_TX: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

/// Dummy transfer key as emitted by the bridge contract
pub const DUMMY_TRANSFER_KEY: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa";

// ============================================================================
// MOCK CHAIN CLIENT
// ============================================================================

#[derive(Debug)]
struct MockState {
    height: u64,
    healthy: bool,
    fee: Amount,
    block_time_secs: u64,
    confirmations: HashMap<String, TxConfirmation>,
    lock_events: Vec<LockEvent>,
    lock_results: VecDeque<Result<String, ChainError>>,
    release_results: VecDeque<Result<String, ChainError>>,
    height_error: Option<ChainError>,
    locks: Vec<LockRequest>,
    releases: Vec<ReleaseRequest>,
    closed: bool,
    tx_counter: u64,
}

/// Chain client whose chain state is set directly by the test.
///
/// Submissions succeed with generated hashes unless a result was queued with
/// `push_lock_result` / `push_release_result`. Unknown hashes report `NotFound`.
#[derive(Debug)]
pub struct MockChainClient {
    network_id: String,
    state: Mutex<MockState>,
}

impl MockChainClient {
    pub fn new(network_id: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            state: Mutex::new(MockState {
                height: 1_000,
                healthy: true,
                fee: Amount::from_raw(1_000_000_000_000_000),
                block_time_secs: 12,
                confirmations: HashMap::new(),
                lock_events: Vec::new(),
                lock_results: VecDeque::new(),
                release_results: VecDeque::new(),
                height_error: None,
                locks: Vec::new(),
                releases: Vec::new(),
                closed: false,
                tx_counter: 0,
            }),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().unwrap().height = height;
    }

    pub fn set_height_error(&self, error: Option<ChainError>) {
        self.state.lock().unwrap().height_error = error;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().unwrap().healthy = healthy;
    }

    pub fn set_fee(&self, fee: Amount, block_time_secs: u64) {
        let mut state = self.state.lock().unwrap();
        state.fee = fee;
        state.block_time_secs = block_time_secs;
    }

    pub fn set_confirmation(&self, tx_hash: &str, confirmation: TxConfirmation) {
        self.state
            .lock()
            .unwrap()
            .confirmations
            .insert(tx_hash.to_string(), confirmation);
    }

    /// Marks `tx_hash` as included with `confirmations` blocks on top.
    pub fn confirm(&self, tx_hash: &str, confirmations: u64) {
        self.set_confirmation(
            tx_hash,
            TxConfirmation::Confirmed {
                confirmations,
                finalized: false,
            },
        );
    }

    pub fn add_lock_event(&self, event: LockEvent) {
        self.state.lock().unwrap().lock_events.push(event);
    }

    pub fn push_lock_result(&self, result: Result<String, ChainError>) {
        self.state.lock().unwrap().lock_results.push_back(result);
    }

    pub fn push_release_result(&self, result: Result<String, ChainError>) {
        self.state.lock().unwrap().release_results.push_back(result);
    }

    pub fn submitted_locks(&self) -> Vec<LockRequest> {
        self.state.lock().unwrap().locks.clone()
    }

    pub fn submitted_releases(&self) -> Vec<ReleaseRequest> {
        self.state.lock().unwrap().releases.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn next_hash(state: &mut MockState, prefix: &str) -> String {
        state.tx_counter += 1;
        format!("0x{}{:060x}", prefix, state.tx_counter)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    fn finality_model(&self) -> FinalityModel {
        FinalityModel::BlockConfirmations
    }

    fn block_time_secs(&self) -> u64 {
        self.state.lock().unwrap().block_time_secs
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address.len() == 42
            && address.starts_with("0x")
            && address[2..].chars().all(|c| c.is_ascii_hexdigit())
    }

    async fn current_height(&self) -> Result<u64, ChainError> {
        let state = self.state.lock().unwrap();
        match &state.height_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.height),
        }
    }

    async fn submit_lock(&self, request: &LockRequest) -> Result<String, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.locks.push(request.clone());
        let queued = state.lock_results.pop_front();
        match queued {
            Some(result) => result,
            None => Ok(Self::next_hash(&mut state, "10")),
        }
    }

    async fn submit_release(&self, request: &ReleaseRequest) -> Result<String, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.releases.push(request.clone());
        let queued = state.release_results.pop_front();
        match queued {
            Some(result) => result,
            None => Ok(Self::next_hash(&mut state, "20")),
        }
    }

    async fn confirmations(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .confirmations
            .get(tx_hash)
            .cloned()
            .unwrap_or(TxConfirmation::NotFound))
    }

    async fn lock_events(&self, from_height: u64, to_height: u64) -> Result<Vec<LockEvent>, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lock_events
            .iter()
            .filter(|e| e.height >= from_height && e.height <= to_height)
            .cloned()
            .collect())
    }

    async fn fee_quote(&self) -> Result<NetworkFeeQuote, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(NetworkFeeQuote {
            fee: state.fee,
            block_time_secs: state.block_time_secs,
        })
    }

    async fn health(&self) -> ChainHealth {
        let state = self.state.lock().unwrap();
        ChainHealth {
            network: self.network_id.clone(),
            healthy: state.healthy,
            height: state.healthy.then_some(state.height),
            latency_ms: 1,
            detail: None,
        }
    }

    async fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// A validator identity with its signing half.
pub struct TestValidator {
    pub info: ValidatorInfo,
    pub signer: ValidatorSigner,
    /// Base64 private key, for building a second signer with the same identity
    pub private_key: String,
}

/// Generates `count` validators named `validator-1` .. `validator-N`.
pub fn create_validators(count: usize) -> Vec<TestValidator> {
    (1..=count)
        .map(|i| {
            let id = format!("validator-{}", i);
            let (private_key, public_key) = generate_keypair();
            TestValidator {
                info: ValidatorInfo {
                    id: id.clone(),
                    address: format!("0x{:040x}", i),
                    public_key,
                    network: DUMMY_SOURCE_NETWORK.to_string(),
                    active: true,
                    reputation: 100,
                },
                signer: ValidatorSigner::from_base64(&id, &private_key).unwrap(),
                private_key,
            }
        })
        .collect()
}

pub fn dummy_token() -> TokenInfo {
    TokenInfo {
        symbol: DUMMY_TOKEN_SYMBOL.to_string(),
        name: "USD Coin".to_string(),
        decimals: DUMMY_TOKEN_DECIMALS,
        source_address: DUMMY_TOKEN_ADDR_SOURCE.to_string(),
        target_address: DUMMY_TOKEN_ADDR_TARGET.to_string(),
        active: true,
    }
}

/// Bridge between the dummy networks with limits [1, 1000], a 0.25% fee and
/// 12 required confirmations.
pub fn build_test_bridge_config(threshold: usize, validators: Vec<ValidatorInfo>) -> BridgeConfig {
    BridgeConfig {
        id: DUMMY_BRIDGE_ID.to_string(),
        name: "Test Bridge".to_string(),
        source_network: DUMMY_SOURCE_NETWORK.to_string(),
        target_network: DUMMY_TARGET_NETWORK.to_string(),
        contract_address_source: DUMMY_CONTRACT_SOURCE.to_string(),
        contract_address_target: DUMMY_CONTRACT_TARGET.to_string(),
        fee_percentage: "0.25".parse().unwrap(),
        min_transfer_amount: "1".parse().unwrap(),
        max_transfer_amount: "1000".parse().unwrap(),
        required_confirmations: DUMMY_REQUIRED_CONFIRMATIONS,
        validator_threshold: threshold,
        security_level: SecurityLevel::Medium,
        config: Map::new(),
        validators,
        tokens: vec![dummy_token()],
    }
}

/// Settings with no recovery grace so sweeps act immediately.
pub fn test_adapter_settings() -> AdapterSettings {
    AdapterSettings {
        instance_id: "test-instance".to_string(),
        recovery_grace: Duration::ZERO,
        recovery_timeout: Duration::from_secs(900),
        release_timeout: Duration::from_secs(600),
        target_confirmations: 1,
        scan_window: 1_000,
        lookback: 100,
    }
}

pub fn test_engine_settings() -> EngineSettings {
    EngineSettings {
        source_poll_interval: Duration::from_millis(20),
        target_poll_interval: Duration::from_millis(20),
        shutdown_timeout: Duration::from_secs(2),
    }
}

pub fn transfer_details(amount: &str) -> TransferDetails {
    TransferDetails {
        source_address: DUMMY_SOURCE_ADDR.to_string(),
        target_address: DUMMY_TARGET_ADDR.to_string(),
        amount: amount.parse().unwrap(),
        token_symbol: DUMMY_TOKEN_SYMBOL.to_string(),
        metadata: Map::new(),
    }
}

/// Lock event for the dummy token, amount given in token base units.
pub fn lock_event(tx_hash: &str, transfer_key: &str, base_units: u128, height: u64) -> LockEvent {
    LockEvent {
        tx_hash: tx_hash.to_string(),
        transfer_key: transfer_key.to_string(),
        sender: DUMMY_SOURCE_ADDR.to_string(),
        recipient: DUMMY_TARGET_ADDR.to_string(),
        token_address: DUMMY_TOKEN_ADDR_SOURCE.to_string(),
        base_units,
        height,
    }
}

// ============================================================================
// BRIDGE BUILDERS
// ============================================================================

/// An initialized adapter with handles on everything behind it.
pub struct TestBridge {
    pub adapter: Arc<ChainBridgeAdapter>,
    pub source: Arc<MockChainClient>,
    pub target: Arc<MockChainClient>,
    pub store: Arc<InMemoryTransferStore>,
    pub validators: Vec<TestValidator>,
    pub config: BridgeConfig,
}

impl TestBridge {
    pub async fn record(&self, transfer_id: &str) -> TransferRecord {
        self.store.get_transfer(transfer_id).await.unwrap().unwrap()
    }

    /// Wraps the adapter in an engine that is not started.
    pub fn engine(&self) -> BridgeEngine {
        BridgeEngine::new(self.config.clone(), self.adapter.clone(), test_engine_settings())
    }
}

/// Builds a bridge with `validator_count` seeded validators, `threshold` of
/// which are required.
pub async fn build_test_bridge(threshold: usize, validator_count: usize) -> TestBridge {
    build_test_bridge_with(threshold, validator_count, test_adapter_settings(), None).await
}

pub async fn build_test_bridge_with(
    threshold: usize,
    validator_count: usize,
    settings: AdapterSettings,
    local_signer: Option<usize>,
) -> TestBridge {
    let validators = create_validators(validator_count);
    let config = build_test_bridge_config(threshold, validators.iter().map(|v| v.info.clone()).collect());
    let source = Arc::new(MockChainClient::new(DUMMY_SOURCE_NETWORK));
    let target = Arc::new(MockChainClient::new(DUMMY_TARGET_NETWORK));
    let store = Arc::new(InMemoryTransferStore::new());

    // a second signer for the same key, owned by the adapter
    let signer = local_signer.map(|index| {
        let validator = &validators[index];
        ValidatorSigner::from_base64(&validator.info.id, &validator.private_key).unwrap()
    });

    let source_client: Arc<dyn ChainClient> = source.clone();
    let target_client: Arc<dyn ChainClient> = target.clone();
    let store_handle: Arc<dyn TransferStore> = store.clone();
    let adapter = Arc::new(ChainBridgeAdapter::new(
        config.clone(),
        settings,
        source_client,
        target_client,
        store_handle,
        signer,
    ));
    adapter.initialize().await.unwrap();

    TestBridge {
        adapter,
        source,
        target,
        store,
        validators,
        config,
    }
}

/// Initiates a transfer of `amount` and returns its id.
pub async fn initiate(bridge: &TestBridge, amount: &str) -> String {
    bridge
        .adapter
        .initiate_transfer(&transfer_details(amount))
        .await
        .unwrap()
        .transfer_id
}

/// Drives a freshly initiated transfer to VALIDATED: confirms its lock at the
/// required depth, runs the source monitor, and collects threshold signatures.
pub async fn drive_to_validated(bridge: &TestBridge, transfer_id: &str) {
    let record = bridge.record(transfer_id).await;
    let lock_hash = record.source_transaction_hash.clone().unwrap();
    bridge.source.confirm(&lock_hash, DUMMY_REQUIRED_CONFIRMATIONS);
    bridge.adapter.monitor_source_chain().await.unwrap();
    assert_eq!(bridge.record(transfer_id).await.status, TransferStatus::SourceConfirmed);

    let threshold = bridge.config.validator_threshold;
    for validator in bridge.validators.iter().take(threshold) {
        let record = bridge.record(transfer_id).await;
        let signature = validator.signer.sign_transfer(&record).unwrap();
        bridge
            .adapter
            .validate_transaction(transfer_id, &validator.info.id, &signature)
            .await
            .unwrap();
    }
    assert_eq!(bridge.record(transfer_id).await.status, TransferStatus::Validated);
}

// ============================================================================
// REGISTRY BUILDERS
// ============================================================================

/// Network kind the mock clients are registered under.
pub const MOCK_KIND: &str = "mock";

/// Table serving `source` for the dummy source network and `target` for
/// everything else.
pub fn mock_adapter_table(source: Arc<MockChainClient>, target: Arc<MockChainClient>) -> AdapterTable {
    let mut table = AdapterTable::new();
    table.register(MOCK_KIND, move |spec: &ClientSpec| {
        let client: Arc<dyn ChainClient> = if spec.network_id == DUMMY_SOURCE_NETWORK {
            source.clone()
        } else {
            target.clone()
        };
        Ok(client)
    });
    table
}

/// Service config with both dummy networks on the mock kind.
pub fn build_test_config(bridges: Vec<BridgeConfig>) -> Config {
    let mut networks = HashMap::new();
    for network_id in [DUMMY_SOURCE_NETWORK, DUMMY_TARGET_NETWORK] {
        networks.insert(
            network_id.to_string(),
            NetworkConfig {
                kind: MOCK_KIND.to_string(),
                rpc_url: "http://127.0.0.1:1".to_string(),
                settings: Map::new(),
            },
        );
    }
    Config {
        service: ServiceConfig {
            instance_id: Some("test-instance".to_string()),
            source_poll_interval_ms: 20,
            target_poll_interval_ms: 20,
            shutdown_timeout_ms: 2_000,
            ..ServiceConfig::default()
        },
        api: ApiConfig::default(),
        networks,
        bridges,
    }
}

/// A registry with one running bridge over mock chains.
pub struct TestRegistry {
    pub registry: Arc<BridgeRegistry>,
    pub source: Arc<MockChainClient>,
    pub target: Arc<MockChainClient>,
    pub store: Arc<InMemoryTransferStore>,
    pub validators: Vec<TestValidator>,
    pub config: BridgeConfig,
}

pub async fn build_test_registry(threshold: usize, validator_count: usize) -> TestRegistry {
    let validators = create_validators(validator_count);
    let config = build_test_bridge_config(threshold, validators.iter().map(|v| v.info.clone()).collect());
    let source = Arc::new(MockChainClient::new(DUMMY_SOURCE_NETWORK));
    let target = Arc::new(MockChainClient::new(DUMMY_TARGET_NETWORK));
    let store = Arc::new(InMemoryTransferStore::new());

    let store_handle: Arc<dyn TransferStore> = store.clone();
    let registry = Arc::new(BridgeRegistry::new(
        &build_test_config(vec![config.clone()]),
        store_handle,
        mock_adapter_table(source.clone(), target.clone()),
    ));
    registry.create_bridge(config.clone()).await.unwrap();

    TestRegistry {
        registry,
        source,
        target,
        store,
        validators,
        config,
    }
}
