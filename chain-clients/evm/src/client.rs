//! EVM Bridge Client
//!
//! Talks to an EVM node over JSON-RPC. Transactions are sent with `eth_sendTransaction`
//! from a relayer account that the node manages (a local signer or a signing proxy),
//! so no key material lives in this process. Finality is measured in block
//! confirmations.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chain_clients_common::{
    normalize_hex, parse_hex_u64, transfer_key, Amount, ChainClient, ChainError, ChainHealth,
    ClientSpec, FinalityModel, JsonRpcClient, LockEvent, LockRequest, NetworkFeeQuote,
    ReleaseRequest, TxConfirmation,
};
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::abi;

const DEFAULT_GAS_LIMIT: u64 = 250_000;
const DEFAULT_BLOCK_TIME_SECS: u64 = 12;
const NATIVE_DECIMALS: u32 = 18;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM event log entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
}

#[derive(Debug, Deserialize)]
struct TransactionReceipt {
    /// 0x1 = success, 0x0 = reverted
    status: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Bridge client for EVM-compatible chains.
pub struct EvmBridgeClient {
    rpc: JsonRpcClient,
    network_id: String,
    contract_address: String,
    /// Account the node signs with (`settings.relayer_address`)
    relayer_address: String,
    gas_limit: u64,
    block_time_secs: u64,
}

impl EvmBridgeClient {
    /// Creates a new EVM bridge client.
    ///
    /// # Arguments
    ///
    /// * `spec` - Connection settings; `settings.relayer_address` is required,
    ///   `settings.gas_limit` and `settings.block_time_secs` are optional
    ///
    /// # Returns
    ///
    /// * `Ok(EvmBridgeClient)` - Client ready to use
    /// * `Err(ChainError)` - Missing or malformed settings
    pub fn new(spec: &ClientSpec) -> Result<Self, ChainError> {
        if !is_evm_address(&spec.contract_address) {
            return Err(ChainError::Configuration(format!(
                "network '{}': invalid bridge contract address '{}'",
                spec.network_id, spec.contract_address
            )));
        }
        let relayer_address = spec.require_str("relayer_address")?.to_string();
        if !is_evm_address(&relayer_address) {
            return Err(ChainError::Configuration(format!(
                "network '{}': invalid relayer address '{}'",
                spec.network_id, relayer_address
            )));
        }

        let rpc = JsonRpcClient::new(&spec.rpc_url, spec.rpc_timeout, spec.retry)?;

        Ok(Self {
            rpc,
            network_id: spec.network_id.clone(),
            contract_address: spec.contract_address.to_lowercase(),
            relayer_address,
            gas_limit: spec.setting_u64("gas_limit").unwrap_or(DEFAULT_GAS_LIMIT),
            block_time_secs: spec
                .setting_u64("block_time_secs")
                .unwrap_or(DEFAULT_BLOCK_TIME_SECS),
        })
    }

    /// Constructor used by the bridge's adapter registration table.
    pub fn connect(spec: &ClientSpec) -> Result<Arc<dyn ChainClient>, ChainError> {
        Ok(Arc::new(Self::new(spec)?))
    }

    /// Gets the current block number.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let hex: String = self.rpc.call_required("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&hex)
    }

    /// Gets the current gas price in wei.
    pub async fn gas_price(&self) -> Result<U256, ChainError> {
        let hex: String = self.rpc.call_required("eth_gasPrice", vec![]).await?;
        parse_hex_u256(&hex)
    }

    async fn send_transaction(&self, data: Vec<u8>) -> Result<String, ChainError> {
        let tx = json!({
            "from": self.relayer_address,
            "to": self.contract_address,
            "gas": format!("0x{:x}", self.gas_limit),
            "data": format!("0x{}", hex::encode(data)),
        });
        let hash: Option<String> = self.rpc.call_once("eth_sendTransaction", vec![tx]).await?;
        hash.ok_or_else(|| {
            ChainError::InvalidResponse("eth_sendTransaction returned no hash".to_string())
        })
    }

    async fn receipt(&self, hash: &str) -> Result<Option<TransactionReceipt>, ChainError> {
        self.rpc
            .call("eth_getTransactionReceipt", vec![json!(normalize_hex(hash))])
            .await
    }

    async fn transaction_known(&self, hash: &str) -> Result<bool, ChainError> {
        let tx: Option<serde_json::Value> = self
            .rpc
            .call("eth_getTransactionByHash", vec![json!(normalize_hex(hash))])
            .await?;
        Ok(tx.is_some())
    }

    /// Queries TokensLocked logs emitted by the bridge contract.
    pub async fn get_locked_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<EvmLog>, ChainError> {
        let filter = json!({
            "address": self.contract_address,
            "topics": [abi::event_topic(abi::LOCKED_EVENT_SIGNATURE)],
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });
        let logs: Option<Vec<EvmLog>> = self.rpc.call("eth_getLogs", vec![filter]).await?;
        Ok(logs.unwrap_or_default())
    }
}

#[async_trait]
impl ChainClient for EvmBridgeClient {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    fn finality_model(&self) -> FinalityModel {
        FinalityModel::BlockConfirmations
    }

    fn block_time_secs(&self) -> u64 {
        self.block_time_secs
    }

    fn is_valid_address(&self, address: &str) -> bool {
        is_evm_address(address)
    }

    async fn current_height(&self) -> Result<u64, ChainError> {
        self.block_number().await
    }

    async fn submit_lock(&self, request: &LockRequest) -> Result<String, ChainError> {
        let token = abi::parse_address(&request.token_address)?;
        let amount = request
            .amount
            .to_base_units(request.token_decimals)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let data = abi::encode_lock(
            &transfer_key(&request.transfer_id),
            &token,
            amount,
            &request.recipient,
        );
        let hash = self.send_transaction(data).await?;
        info!(
            "Submitted lock on {} for transfer {}: {}",
            self.network_id, request.transfer_id, hash
        );
        Ok(hash)
    }

    async fn submit_release(&self, request: &ReleaseRequest) -> Result<String, ChainError> {
        let token = abi::parse_address(&request.token_address)?;
        let recipient = abi::parse_address(&request.recipient)?;
        let amount = request
            .amount
            .to_base_units(request.token_decimals)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let data = abi::encode_release(
            &transfer_key(&request.transfer_id),
            &token,
            &recipient,
            amount,
        );
        let hash = self.send_transaction(data).await?;
        info!(
            "Submitted release on {} for transfer {}: {}",
            self.network_id, request.transfer_id, hash
        );
        Ok(hash)
    }

    async fn confirmations(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError> {
        let receipt = match self.receipt(tx_hash).await? {
            Some(receipt) => receipt,
            None => {
                return Ok(if self.transaction_known(tx_hash).await? {
                    TxConfirmation::Pending
                } else {
                    TxConfirmation::NotFound
                });
            }
        };

        if receipt.status.as_deref() == Some("0x0") {
            return Ok(TxConfirmation::Failed(format!(
                "transaction {} reverted",
                tx_hash
            )));
        }

        let included_at = match receipt.block_number {
            Some(n) => parse_hex_u64(&n)?,
            None => return Ok(TxConfirmation::Pending),
        };
        let head = self.block_number().await?;
        let confirmations = head.saturating_sub(included_at) + 1;
        debug!(
            "{} on {}: included at {}, head {}, {} confirmations",
            tx_hash, self.network_id, included_at, head, confirmations
        );
        Ok(TxConfirmation::Confirmed {
            confirmations,
            finalized: false,
        })
    }

    async fn lock_events(
        &self,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<LockEvent>, ChainError> {
        let logs = self.get_locked_logs(from_height, to_height).await?;
        let mut events = Vec::new();

        for log in logs {
            // topics[0] = signature, topics[1] = transferId, topics[2] = sender (padded)
            let sender = match log.topics.get(2).filter(|t| t.len() == 66).and_then(|t| t.get(26..)) {
                Some(sender) => format!("0x{}", sender),
                None => {
                    debug!("Skipping malformed TokensLocked log in {}", log.transaction_hash);
                    continue;
                }
            };
            let data = match abi::decode_locked_data(&log.data) {
                Ok(data) => data,
                Err(e) => {
                    debug!("Skipping undecodable TokensLocked log in {}: {}", log.transaction_hash, e);
                    continue;
                }
            };
            events.push(LockEvent {
                tx_hash: log.transaction_hash.clone(),
                transfer_key: log.topics[1].to_lowercase(),
                sender,
                recipient: data.recipient,
                token_address: data.token,
                base_units: data.amount,
                height: parse_hex_u64(&log.block_number)?,
            });
        }

        Ok(events)
    }

    async fn fee_quote(&self) -> Result<NetworkFeeQuote, ChainError> {
        let price = self.gas_price().await?;
        let wei = price
            .checked_mul(U256::from(self.gas_limit))
            .filter(|v| *v <= U256::from(u128::MAX))
            .ok_or_else(|| ChainError::InvalidResponse("gas cost overflows".to_string()))?;
        let fee = Amount::from_base_units(wei.low_u128(), NATIVE_DECIMALS)
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        Ok(NetworkFeeQuote {
            fee,
            block_time_secs: self.block_time_secs,
        })
    }

    async fn health(&self) -> ChainHealth {
        let started = Instant::now();
        let result = self.block_number().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(height) => ChainHealth {
                network: self.network_id.clone(),
                healthy: true,
                height: Some(height),
                latency_ms,
                detail: None,
            },
            Err(e) => ChainHealth {
                network: self.network_id.clone(),
                healthy: false,
                height: None,
                latency_ms,
                detail: Some(e.to_string()),
            },
        }
    }
}

/// Returns true for a 0x-prefixed 20-byte hex address.
pub fn is_evm_address(value: &str) -> bool {
    match value.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn parse_hex_u256(value: &str) -> Result<U256, ChainError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    U256::from_str_radix(stripped, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("Invalid hex quantity '{}': {:?}", value, e)))
}
