//! Configuration Management Module
//!
//! Loads the bridge service configuration from TOML: service-wide timings, the
//! API listener, the chain networks the service can reach, and one block per
//! bridge instance. Secrets are referenced by environment variable name and
//! never stored in the file.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chain_clients_common::{Amount, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transfer::{TokenInfo, ValidatorInfo};

pub const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/bridge.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Network identifier -> connection settings
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,
}

/// Service-wide timings and the optional local validator identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Source monitor period in milliseconds
    pub source_poll_interval_ms: u64,
    /// Completion sweeper period in milliseconds
    pub target_poll_interval_ms: u64,
    /// INITIATED records younger than this are left to the in-flight caller
    pub recovery_grace_secs: u64,
    /// Submitted locks never observed on chain within this window fail
    pub recovery_timeout_secs: u64,
    /// A release claim or unconfirmed release older than this is retried
    pub release_timeout_secs: u64,
    pub rpc_timeout_ms: u64,
    pub rpc_max_attempts: u32,
    pub rpc_initial_backoff_ms: u64,
    pub rpc_max_backoff_ms: u64,
    /// Bound on waiting for monitor tasks to stop
    pub shutdown_timeout_ms: u64,
    /// Identifies this process in release claims; random when unset
    pub instance_id: Option<String>,
    pub validator: Option<LocalValidatorConfig>,
}

/// Validator identity this process signs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalValidatorConfig {
    /// Validator id as registered on the bridges
    pub id: String,
    /// Environment variable holding the base64 Ed25519 private key
    pub private_key_env: String,
}

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Client kind from the registration table ("evm", "svm", "fvm")
    pub kind: String,
    pub rpc_url: String,
    /// Chain-specific client settings
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Static configuration of one bridge instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub id: String,
    pub name: String,
    #[serde(alias = "sourceNetwork")]
    pub source_network: String,
    #[serde(alias = "targetNetwork")]
    pub target_network: String,
    #[serde(alias = "contractAddressSource")]
    pub contract_address_source: String,
    #[serde(alias = "contractAddressTarget")]
    pub contract_address_target: String,
    /// Percent of the amount, e.g. "0.25"
    #[serde(alias = "feePercentage")]
    pub fee_percentage: Amount,
    #[serde(alias = "minTransferAmount")]
    pub min_transfer_amount: Amount,
    #[serde(alias = "maxTransferAmount")]
    pub max_transfer_amount: Amount,
    #[serde(alias = "requiredConfirmations")]
    pub required_confirmations: u64,
    /// M of the M-of-N validator quorum
    #[serde(alias = "validatorThreshold")]
    pub validator_threshold: usize,
    #[serde(default, alias = "securityLevel")]
    pub security_level: SecurityLevel,
    /// Adapter-specific settings
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Validators registered when the bridge starts
    #[serde(default)]
    pub validators: Vec<ValidatorInfo>,
    /// Tokens registered when the bridge starts
    #[serde(default)]
    pub tokens: Vec<TokenInfo>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            source_poll_interval_ms: 5_000,
            target_poll_interval_ms: 5_000,
            recovery_grace_secs: 60,
            recovery_timeout_secs: 900,
            release_timeout_secs: 600,
            rpc_timeout_ms: 10_000,
            rpc_max_attempts: 3,
            rpc_initial_backoff_ms: 200,
            rpc_max_backoff_ms: 2_000,
            shutdown_timeout_ms: 5_000,
            instance_id: None,
            validator: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3340,
        }
    }
}

impl ServiceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.rpc_max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.rpc_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.rpc_max_backoff_ms),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn source_poll_interval(&self) -> Duration {
        Duration::from_millis(self.source_poll_interval_ms)
    }

    pub fn target_poll_interval(&self) -> Duration {
        Duration::from_millis(self.target_poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl BridgeConfig {
    /// Reads a numeric adapter setting given either as a number or a string.
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }
}

// ============================================================================
// CONFIGURATION LOADING AND VALIDATION
// ============================================================================

impl Config {
    /// Loads configuration from `BRIDGE_CONFIG_PATH`, or `config/bridge.toml`.
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Parsed and validated configuration
    /// - `Err(anyhow::Error)` - File missing, unparsable or invalid
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(&config_path)
    }

    /// Loads and validates configuration from an explicit path.
    pub fn load_from_path(config_path: &str) -> anyhow::Result<Self> {
        if !Path::new(config_path).exists() {
            // Configuration file doesn't exist - operator needs to copy the template
            bail!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/bridge.template.toml config/bridge.toml\n\
                Then edit config/bridge.toml with your actual values.",
                config_path
            );
        }
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path))?;
        Self::from_toml(&content).with_context(|| format!("loading {}", config_path))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service.source_poll_interval_ms == 0 || self.service.target_poll_interval_ms == 0 {
            bail!("service polling intervals must be positive");
        }

        for (network_id, network) in &self.networks {
            let url = url::Url::parse(&network.rpc_url)
                .map_err(|e| anyhow!("network '{}': invalid rpc_url: {}", network_id, e))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                bail!(
                    "network '{}': rpc_url must be http(s), got '{}'",
                    network_id,
                    url.scheme()
                );
            }
        }

        let mut seen = HashSet::new();
        for bridge in &self.bridges {
            if !seen.insert(bridge.id.as_str()) {
                bail!("duplicate bridge id '{}'", bridge.id);
            }
            for network in [&bridge.source_network, &bridge.target_network] {
                if !self.networks.contains_key(network) {
                    bail!("bridge '{}': unknown network '{}'", bridge.id, network);
                }
            }
            if bridge.min_transfer_amount > bridge.max_transfer_amount {
                bail!(
                    "bridge '{}': min transfer amount {} exceeds max {}",
                    bridge.id,
                    bridge.min_transfer_amount,
                    bridge.max_transfer_amount
                );
            }
            if bridge.fee_percentage > Amount::from_units(100) {
                bail!(
                    "bridge '{}': fee percentage {} is outside [0, 100]",
                    bridge.id,
                    bridge.fee_percentage
                );
            }
            if bridge.validator_threshold == 0 {
                bail!("bridge '{}': validator threshold must be at least 1", bridge.id);
            }
            if !bridge.validators.is_empty() && bridge.validator_threshold > bridge.validators.len() {
                bail!(
                    "bridge '{}': threshold {} exceeds the {} seeded validators",
                    bridge.id,
                    bridge.validator_threshold,
                    bridge.validators.len()
                );
            }
        }
        Ok(())
    }
}
