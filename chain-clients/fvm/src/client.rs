//! FVM Bridge Client
//!
//! Bridge backend for the content-addressed-storage chain, spoken to through a Lotus
//! node's `Filecoin.*` JSON-RPC API. Messages are pushed with `MpoolPushMessage`, so
//! the node's wallet signs them. A successful execution receipt is treated as final.
//! A message with no receipt that is also absent from the node's mempool is
//! reported as not found.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chain_clients_common::{
    transfer_key_hex, Amount, ChainClient, ChainError, ChainHealth, ClientSpec, FinalityModel,
    JsonRpcClient, LockEvent, LockRequest, NetworkFeeQuote, ReleaseRequest, TxConfirmation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

const DEFAULT_LOCK_METHOD: u64 = 2;
const DEFAULT_RELEASE_METHOD: u64 = 3;
const DEFAULT_MESSAGE_FEE_ATTO: u64 = 100_000_000_000_000;
const EPOCH_SECS: u64 = 30;
const NATIVE_DECIMALS: u32 = 18;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cid {
    #[serde(rename = "/")]
    pub root: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TipSet {
    height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignedMessage {
    #[serde(rename = "CID")]
    cid: Cid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MessageReceipt {
    exit_code: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MsgLookup {
    receipt: MessageReceipt,
    height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChainMessage {
    from: String,
    method: u64,
    params: Option<String>,
}

/// Bridge actor parameters, JSON encoded and base64 wrapped in the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeParams {
    pub transfer: String,
    pub token: String,
    /// Base units as a decimal string
    pub amount: String,
    pub recipient: String,
}

// ============================================================================
// FVM CLIENT IMPLEMENTATION
// ============================================================================

/// Bridge client for Lotus-compatible nodes.
pub struct FvmBridgeClient {
    rpc: JsonRpcClient,
    network_id: String,
    /// Bridge actor address
    actor_address: String,
    /// Wallet address the node signs with
    from_address: String,
    lock_method: u64,
    release_method: u64,
    message_fee_atto: u64,
}

impl FvmBridgeClient {
    /// Creates a new FVM bridge client.
    ///
    /// # Arguments
    ///
    /// * `spec` - Connection settings; `settings.from_address` is required and
    ///   `settings.auth_token_env` optionally names an env var with a Lotus API token
    ///
    /// # Returns
    ///
    /// * `Ok(FvmBridgeClient)` - Client ready to use
    /// * `Err(ChainError)` - Invalid addresses or a missing token env var
    pub fn new(spec: &ClientSpec) -> Result<Self, ChainError> {
        if !is_fvm_address(&spec.contract_address) {
            return Err(ChainError::Configuration(format!(
                "network '{}': invalid bridge actor address '{}'",
                spec.network_id, spec.contract_address
            )));
        }
        let from_address = spec.require_str("from_address")?.to_string();
        if !is_fvm_address(&from_address) {
            return Err(ChainError::Configuration(format!(
                "network '{}': invalid sender address '{}'",
                spec.network_id, from_address
            )));
        }

        let mut rpc = JsonRpcClient::new(&spec.rpc_url, spec.rpc_timeout, spec.retry)?;
        if let Some(env_name) = spec.setting_str("auth_token_env") {
            let token = std::env::var(env_name).map_err(|_| {
                ChainError::Configuration(format!("Missing Lotus auth token env var: {}", env_name))
            })?;
            rpc = rpc.with_bearer_token(token);
        }

        Ok(Self {
            rpc,
            network_id: spec.network_id.clone(),
            actor_address: spec.contract_address.clone(),
            from_address,
            lock_method: spec.setting_u64("lock_method").unwrap_or(DEFAULT_LOCK_METHOD),
            release_method: spec
                .setting_u64("release_method")
                .unwrap_or(DEFAULT_RELEASE_METHOD),
            message_fee_atto: spec
                .setting_u64("message_fee_atto")
                .unwrap_or(DEFAULT_MESSAGE_FEE_ATTO),
        })
    }

    /// Constructor used by the bridge's adapter registration table.
    pub fn connect(spec: &ClientSpec) -> Result<Arc<dyn ChainClient>, ChainError> {
        Ok(Arc::new(Self::new(spec)?))
    }

    /// Gets the height of the current head tipset.
    pub async fn chain_head_height(&self) -> Result<u64, ChainError> {
        let head: TipSet = self.rpc.call_required("Filecoin.ChainHead", vec![]).await?;
        Ok(head.height)
    }

    async fn push_message(&self, method_num: u64, params: &BridgeParams) -> Result<String, ChainError> {
        let encoded = serde_json::to_vec(params)
            .map_err(|e| ChainError::Rejected(format!("Failed to encode params: {}", e)))?;
        let message = json!({
            "Version": 0,
            "To": self.actor_address,
            "From": self.from_address,
            "Nonce": 0,
            "Value": "0",
            "GasLimit": 0,
            "GasFeeCap": "0",
            "GasPremium": "0",
            "Method": method_num,
            "Params": STANDARD.encode(encoded),
        });
        let signed: Option<SignedMessage> = self
            .rpc
            .call_once("Filecoin.MpoolPushMessage", vec![message, json!(null)])
            .await?;
        signed.map(|s| s.cid.root).ok_or_else(|| {
            ChainError::InvalidResponse("MpoolPushMessage returned no message".to_string())
        })
    }

    async fn search_message(&self, cid: &str) -> Result<Option<MsgLookup>, ChainError> {
        self.rpc
            .call(
                "Filecoin.StateSearchMsg",
                vec![json!([]), json!({ "/": cid }), json!(-1), json!(true)],
            )
            .await
    }

    /// True when `cid` is waiting in the node's message pool.
    async fn in_mpool(&self, cid: &str) -> Result<bool, ChainError> {
        let pending: Option<Vec<SignedMessage>> = self
            .rpc
            .call("Filecoin.MpoolPending", vec![json!([])])
            .await?;
        Ok(pending.unwrap_or_default().iter().any(|m| m.cid.root == cid))
    }
}

#[async_trait]
impl ChainClient for FvmBridgeClient {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    fn finality_model(&self) -> FinalityModel {
        FinalityModel::ReceiptAcknowledgment
    }

    fn block_time_secs(&self) -> u64 {
        EPOCH_SECS
    }

    fn is_valid_address(&self, address: &str) -> bool {
        is_fvm_address(address)
    }

    async fn current_height(&self) -> Result<u64, ChainError> {
        self.chain_head_height().await
    }

    async fn submit_lock(&self, request: &LockRequest) -> Result<String, ChainError> {
        let units = request
            .amount
            .to_base_units(request.token_decimals)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let params = BridgeParams {
            transfer: transfer_key_hex(&request.transfer_id),
            token: request.token_address.clone(),
            amount: units.to_string(),
            recipient: request.recipient.clone(),
        };
        let cid = self.push_message(self.lock_method, &params).await?;
        info!(
            "Submitted lock on {} for transfer {}: {}",
            self.network_id, request.transfer_id, cid
        );
        Ok(cid)
    }

    async fn submit_release(&self, request: &ReleaseRequest) -> Result<String, ChainError> {
        let units = request
            .amount
            .to_base_units(request.token_decimals)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let params = BridgeParams {
            transfer: transfer_key_hex(&request.transfer_id),
            token: request.token_address.clone(),
            amount: units.to_string(),
            recipient: request.recipient.clone(),
        };
        let cid = self.push_message(self.release_method, &params).await?;
        info!(
            "Submitted release on {} for transfer {}: {}",
            self.network_id, request.transfer_id, cid
        );
        Ok(cid)
    }

    async fn confirmations(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError> {
        let lookup = match self.search_message(tx_hash).await? {
            Some(lookup) => lookup,
            None if self.in_mpool(tx_hash).await? => return Ok(TxConfirmation::Pending),
            None => return Ok(TxConfirmation::NotFound),
        };
        if lookup.receipt.exit_code != 0 {
            return Ok(TxConfirmation::Failed(format!(
                "message {} exited with code {}",
                tx_hash, lookup.receipt.exit_code
            )));
        }
        let head = self.chain_head_height().await?;
        Ok(TxConfirmation::Confirmed {
            confirmations: head.saturating_sub(lookup.height) + 1,
            finalized: true,
        })
    }

    async fn lock_events(
        &self,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<LockEvent>, ChainError> {
        let cids: Option<Vec<Cid>> = self
            .rpc
            .call(
                "Filecoin.StateListMessages",
                vec![json!({ "To": self.actor_address }), json!([]), json!(from_height)],
            )
            .await?;

        let mut events = Vec::new();
        for cid in cids.unwrap_or_default() {
            let message: ChainMessage = match self
                .rpc
                .call("Filecoin.ChainGetMessage", vec![json!(cid)])
                .await?
            {
                Some(message) => message,
                None => continue,
            };
            if message.method != self.lock_method {
                continue;
            }
            let params = match message.params.as_deref().and_then(decode_params) {
                Some(params) => params,
                None => {
                    debug!("Skipping lock message {} with undecodable params", cid.root);
                    continue;
                }
            };
            let lookup = match self.search_message(&cid.root).await? {
                Some(lookup) if lookup.receipt.exit_code == 0 => lookup,
                _ => continue,
            };
            if lookup.height < from_height || lookup.height > to_height {
                continue;
            }
            let base_units = match params.amount.parse::<u128>() {
                Ok(units) => units,
                Err(_) => continue,
            };
            events.push(LockEvent {
                tx_hash: cid.root.clone(),
                transfer_key: params.transfer.to_lowercase(),
                sender: message.from,
                recipient: params.recipient,
                token_address: params.token,
                base_units,
                height: lookup.height,
            });
        }

        Ok(events)
    }

    async fn fee_quote(&self) -> Result<NetworkFeeQuote, ChainError> {
        let fee = Amount::from_base_units(u128::from(self.message_fee_atto), NATIVE_DECIMALS)
            .map_err(|e| ChainError::Configuration(e.to_string()))?;
        Ok(NetworkFeeQuote {
            fee,
            block_time_secs: EPOCH_SECS,
        })
    }

    async fn health(&self) -> ChainHealth {
        let started = Instant::now();
        let result = self.chain_head_height().await;
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

fn decode_params(encoded: &str) -> Option<BridgeParams> {
    let bytes = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Checks Filecoin address syntax (`f`/`t` network prefix, protocols 0 to 4).
pub fn is_fvm_address(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some('f') | Some('t') => {}
        _ => return false,
    }
    let protocol = match chars.next() {
        Some(p) => p,
        None => return false,
    };
    let payload = chars.as_str();
    let is_base32 = |s: &str| s.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7'));
    match protocol {
        '0' => !payload.is_empty() && payload.len() <= 20 && payload.chars().all(|c| c.is_ascii_digit()),
        '1' | '2' => payload.len() == 39 && is_base32(payload),
        '3' => payload.len() == 84 && is_base32(payload),
        '4' => match payload.split_once('f') {
            Some((namespace, sub)) => {
                !namespace.is_empty()
                    && namespace.chars().all(|c| c.is_ascii_digit())
                    && !sub.is_empty()
                    && is_base32(sub)
            }
            None => false,
        },
        _ => false,
    }
}
