//! Bridge Registry
//!
//! Builds bridge engines from configuration and owns them until shutdown. Chain
//! clients are picked from an [`AdapterTable`] keyed by network kind; adding a
//! chain family means registering one more constructor, nothing else changes.
//!
//! The registry is an ordinary value created by the binary and handed to the API
//! layer. There is no process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;

use chain_clients_common::{ChainClient, ChainError, ClientSpec};
use chain_clients_evm::EvmBridgeClient;
use chain_clients_fvm::FvmBridgeClient;
use chain_clients_svm::SvmBridgeClient;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::adapter::{AdapterSettings, ChainBridgeAdapter, NetworkAdapter};
use crate::config::{BridgeConfig, Config, NetworkConfig, ServiceConfig};
use crate::crypto::ValidatorSigner;
use crate::engine::{BridgeEngine, EngineSettings};
use crate::error::BridgeError;
use crate::storage::TransferStore;

/// Constructor for a chain client of one network kind.
pub type ClientConstructor =
    Arc<dyn Fn(&ClientSpec) -> Result<Arc<dyn ChainClient>, ChainError> + Send + Sync>;

// ============================================================================
// ADAPTER REGISTRATION TABLE
// ============================================================================

#[derive(Clone, Default)]
pub struct AdapterTable {
    constructors: HashMap<String, ClientConstructor>,
}

impl AdapterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in chain families. The settlement chain speaks EVM
    /// JSON-RPC and reuses that client.
    pub fn with_default_networks() -> Self {
        let mut table = Self::new();
        table.register("evm", EvmBridgeClient::connect);
        table.register("svm", SvmBridgeClient::connect);
        table.register("fvm", FvmBridgeClient::connect);
        table.register("settlement", EvmBridgeClient::connect);
        table
    }

    /// Registers (or replaces) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&ClientSpec) -> Result<Arc<dyn ChainClient>, ChainError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_lowercase(), Arc::new(constructor));
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Builds a client for `spec.kind`.
    pub fn connect(&self, spec: &ClientSpec) -> Result<Arc<dyn ChainClient>, BridgeError> {
        let constructor = self.constructors.get(&spec.kind.to_lowercase()).ok_or_else(|| {
            BridgeError::Configuration(format!(
                "network '{}' has unsupported kind '{}'",
                spec.network_id, spec.kind
            ))
        })?;
        constructor(spec).map_err(|e| BridgeError::Configuration(e.to_string()))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct BridgeRegistry {
    table: AdapterTable,
    store: Arc<dyn TransferStore>,
    service: ServiceConfig,
    networks: HashMap<String, NetworkConfig>,
    engines: RwLock<HashMap<String, Arc<BridgeEngine>>>,
}

impl BridgeRegistry {
    pub fn new(config: &Config, store: Arc<dyn TransferStore>, table: AdapterTable) -> Self {
        Self {
            table,
            store,
            service: config.service.clone(),
            networks: config.networks.clone(),
            engines: RwLock::new(HashMap::new()),
        }
    }

    fn client_spec(&self, network_id: &str, contract_address: &str) -> Result<ClientSpec, BridgeError> {
        let network = self.networks.get(network_id).ok_or_else(|| {
            BridgeError::Configuration(format!("unsupported network '{}'", network_id))
        })?;
        if contract_address.trim().is_empty() {
            return Err(BridgeError::Configuration(format!(
                "missing contract address for network '{}'",
                network_id
            )));
        }
        Ok(ClientSpec {
            network_id: network_id.to_string(),
            kind: network.kind.clone(),
            rpc_url: network.rpc_url.clone(),
            contract_address: contract_address.to_string(),
            rpc_timeout: self.service.rpc_timeout(),
            retry: self.service.retry_policy(),
            settings: network.settings.clone(),
        })
    }

    /// Builds, initializes and starts the engine of one bridge.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<BridgeEngine>)` - Running engine, now owned by the registry
    /// * `Err(BridgeError::Configuration)` - The bridge was not created
    pub async fn create_bridge(&self, bridge: BridgeConfig) -> Result<Arc<BridgeEngine>, BridgeError> {
        if self.engines.read().await.contains_key(&bridge.id) {
            return Err(BridgeError::Configuration(format!(
                "bridge '{}' is already running",
                bridge.id
            )));
        }

        let source_spec = self.client_spec(&bridge.source_network, &bridge.contract_address_source)?;
        let target_spec = self.client_spec(&bridge.target_network, &bridge.contract_address_target)?;
        let source = self.table.connect(&source_spec)?;
        let target = self.table.connect(&target_spec)?;

        let signer = match &self.service.validator {
            Some(local) => Some(ValidatorSigner::from_env(&local.id, &local.private_key_env)?),
            None => None,
        };

        let adapter = Arc::new(ChainBridgeAdapter::new(
            bridge.clone(),
            AdapterSettings::from_config(&self.service, &bridge),
            source,
            target,
            self.store.clone(),
            signer,
        ));
        if let Err(e) = adapter.initialize().await {
            adapter.shutdown().await;
            return Err(e);
        }

        let id = bridge.id.clone();
        let engine = Arc::new(BridgeEngine::new(
            bridge,
            adapter.clone(),
            EngineSettings::from(&self.service),
        ));

        let mut engines = self.engines.write().await;
        if engines.contains_key(&id) {
            adapter.shutdown().await;
            return Err(BridgeError::Configuration(format!(
                "bridge '{}' is already running",
                id
            )));
        }
        engine.start().await;
        engines.insert(id.clone(), engine.clone());
        info!("Bridge {} registered", id);
        Ok(engine)
    }

    /// Creates every configured bridge, stopping at the first failure.
    pub async fn create_bridges(&self, bridges: &[BridgeConfig]) -> Result<usize, BridgeError> {
        for bridge in bridges {
            if let Err(e) = self.create_bridge(bridge.clone()).await {
                error!("Bridge {} not created: {}", bridge.id, e);
                return Err(e);
            }
        }
        Ok(bridges.len())
    }

    pub async fn get(&self, bridge_id: &str) -> Option<Arc<BridgeEngine>> {
        self.engines.read().await.get(bridge_id).cloned()
    }

    pub async fn bridge_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops one bridge and forgets it. Returns false for an unknown id.
    pub async fn shutdown_bridge(&self, bridge_id: &str) -> bool {
        let engine = self.engines.write().await.remove(bridge_id);
        match engine {
            Some(engine) => {
                engine.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Stops every bridge concurrently.
    pub async fn shutdown_all(&self) {
        let engines: Vec<Arc<BridgeEngine>> = self
            .engines
            .write()
            .await
            .drain()
            .map(|(_, engine)| engine)
            .collect();
        join_all(engines.iter().map(|engine| engine.shutdown())).await;
        info!("All bridges stopped");
    }
}
