//! SVM Bridge Client
//!
//! Bridge backend for Solana-style chains. Transactions are built and signed locally
//! with the relayer keypair (base58, read from the env var named in
//! `settings.payer_key_env` at call time) and broadcast through `sendTransaction`.
//! Finality is measured in slots; a `finalized` commitment status is final on its own.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chain_clients_common::{
    transfer_key, Amount, ChainClient, ChainError, ChainHealth, ClientSpec, FinalityModel,
    JsonRpcClient, LockEvent, LockRequest, NetworkFeeQuote, ReleaseRequest, TxConfirmation,
};
use serde::Deserialize;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use tracing::{debug, info};

use crate::instruction::{self, LOCK_LOG_PREFIX};

const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5_000;
const DEFAULT_SIGNATURE_LIMIT: u64 = 1_000;
const NATIVE_DECIMALS: u32 = 9;
const SLOT_TIME_SECS: u64 = 1;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

#[derive(Debug, Deserialize)]
struct RpcContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct RpcWithContext<T> {
    context: RpcContext,
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    slot: u64,
    err: Option<serde_json::Value>,
    confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignatureInfo {
    signature: String,
    slot: u64,
    err: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    err: Option<serde_json::Value>,
    log_messages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ConfirmedTransaction {
    slot: u64,
    meta: Option<TransactionMeta>,
}

// ============================================================================
// SVM CLIENT IMPLEMENTATION
// ============================================================================

/// Bridge client for SVM chains.
pub struct SvmBridgeClient {
    rpc: JsonRpcClient,
    network_id: String,
    program_id: Pubkey,
    /// Env var name holding the relayer keypair (base58, 64 bytes)
    payer_key_env: String,
    lamports_per_signature: u64,
    signature_limit: u64,
}

impl SvmBridgeClient {
    /// Creates a new SVM bridge client.
    ///
    /// # Arguments
    ///
    /// * `spec` - Connection settings; `settings.payer_key_env` is required
    ///
    /// # Returns
    ///
    /// * `Ok(SvmBridgeClient)` - Client ready to use
    /// * `Err(ChainError)` - Invalid program id or missing settings
    pub fn new(spec: &ClientSpec) -> Result<Self, ChainError> {
        let program_id = Pubkey::from_str(&spec.contract_address).map_err(|e| {
            ChainError::Configuration(format!(
                "network '{}': invalid bridge program id '{}': {}",
                spec.network_id, spec.contract_address, e
            ))
        })?;
        let payer_key_env = spec.require_str("payer_key_env")?.to_string();
        let rpc = JsonRpcClient::new(&spec.rpc_url, spec.rpc_timeout, spec.retry)?;

        Ok(Self {
            rpc,
            network_id: spec.network_id.clone(),
            program_id,
            payer_key_env,
            lamports_per_signature: spec
                .setting_u64("lamports_per_signature")
                .unwrap_or(DEFAULT_LAMPORTS_PER_SIGNATURE),
            signature_limit: spec
                .setting_u64("signature_limit")
                .unwrap_or(DEFAULT_SIGNATURE_LIMIT),
        })
    }

    /// Constructor used by the bridge's adapter registration table.
    pub fn connect(spec: &ClientSpec) -> Result<Arc<dyn ChainClient>, ChainError> {
        Ok(Arc::new(Self::new(spec)?))
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Gets the current slot.
    pub async fn get_slot(&self) -> Result<u64, ChainError> {
        self.rpc
            .call_required("getSlot", vec![json!({"commitment": "confirmed"})])
            .await
    }

    async fn latest_blockhash(&self) -> Result<Hash, ChainError> {
        let response: RpcWithContext<LatestBlockhash> = self
            .rpc
            .call_required("getLatestBlockhash", vec![json!({"commitment": "confirmed"})])
            .await?;
        Hash::from_str(&response.value.blockhash).map_err(|e| {
            ChainError::InvalidResponse(format!("Invalid blockhash '{}': {}", response.value.blockhash, e))
        })
    }

    fn load_payer_keypair(&self) -> Result<Keypair, ChainError> {
        let private_key_b58 = std::env::var(&self.payer_key_env).map_err(|_| {
            ChainError::Configuration(format!(
                "Missing SVM payer private key env var: {}",
                self.payer_key_env
            ))
        })?;
        keypair_from_base58(&private_key_b58)
    }

    async fn send_instruction(&self, payer: &Keypair, ix: Instruction) -> Result<String, ChainError> {
        let blockhash = self.latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&payer.pubkey()), &[payer], blockhash);
        let wire = bincode::serialize(&tx).map_err(|e| {
            ChainError::Rejected(format!("Failed to serialize transaction: {}", e))
        })?;
        let signature: Option<String> = self
            .rpc
            .call_once(
                "sendTransaction",
                vec![
                    json!(STANDARD.encode(wire)),
                    json!({"encoding": "base64", "preflightCommitment": "confirmed"}),
                ],
            )
            .await?;
        signature.ok_or_else(|| {
            ChainError::InvalidResponse("sendTransaction returned no signature".to_string())
        })
    }

    async fn transaction_logs(&self, signature: &str) -> Result<Option<ConfirmedTransaction>, ChainError> {
        self.rpc
            .call(
                "getTransaction",
                vec![
                    json!(signature),
                    json!({"encoding": "json", "maxSupportedTransactionVersion": 0}),
                ],
            )
            .await
    }

    /// Pages `getSignaturesForAddress` backwards (newest first) until a page
    /// reaches below `from_slot` or the history runs out.
    async fn program_signatures_since(&self, from_slot: u64) -> Result<Vec<SignatureInfo>, ChainError> {
        let mut collected = Vec::new();
        let mut before: Option<String> = None;
        loop {
            let mut options = json!({"limit": self.signature_limit, "commitment": "confirmed"});
            if let Some(signature) = &before {
                options["before"] = json!(signature);
            }
            let page: Vec<SignatureInfo> = self
                .rpc
                .call(
                    "getSignaturesForAddress",
                    vec![json!(self.program_id.to_string()), options],
                )
                .await?
                .unwrap_or_default();

            let full_page = page.len() as u64 >= self.signature_limit;
            let (oldest_slot, oldest_signature) = match page.last() {
                Some(info) => (info.slot, info.signature.clone()),
                None => break,
            };
            collected.extend(page);
            if !full_page
                || oldest_slot < from_slot
                || before.as_deref() == Some(oldest_signature.as_str())
            {
                break;
            }
            before = Some(oldest_signature);
        }
        Ok(collected)
    }
}

#[async_trait]
impl ChainClient for SvmBridgeClient {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    fn finality_model(&self) -> FinalityModel {
        FinalityModel::SlotConfirmations
    }

    fn block_time_secs(&self) -> u64 {
        SLOT_TIME_SECS
    }

    fn is_valid_address(&self, address: &str) -> bool {
        Pubkey::from_str(address).is_ok()
    }

    async fn current_height(&self) -> Result<u64, ChainError> {
        self.get_slot().await
    }

    async fn submit_lock(&self, request: &LockRequest) -> Result<String, ChainError> {
        let payer = self.load_payer_keypair()?;
        let sender = parse_pubkey(&request.sender, "sender")?;
        let mint = parse_pubkey(&request.token_address, "token mint")?;
        let amount = base_units_u64(&request.amount, request.token_decimals)?;
        let ix = instruction::lock_instruction(
            &self.program_id,
            &payer.pubkey(),
            &sender,
            &mint,
            transfer_key(&request.transfer_id),
            amount,
            &request.recipient,
        )
        .map_err(|e| ChainError::Rejected(format!("Failed to encode lock instruction: {}", e)))?;

        let signature = self.send_instruction(&payer, ix).await?;
        info!(
            "Submitted lock on {} for transfer {}: {}",
            self.network_id, request.transfer_id, signature
        );
        Ok(signature)
    }

    async fn submit_release(&self, request: &ReleaseRequest) -> Result<String, ChainError> {
        let payer = self.load_payer_keypair()?;
        let recipient = parse_pubkey(&request.recipient, "recipient")?;
        let mint = parse_pubkey(&request.token_address, "token mint")?;
        let amount = base_units_u64(&request.amount, request.token_decimals)?;
        let ix = instruction::release_instruction(
            &self.program_id,
            &payer.pubkey(),
            &recipient,
            &mint,
            transfer_key(&request.transfer_id),
            amount,
        )
        .map_err(|e| ChainError::Rejected(format!("Failed to encode release instruction: {}", e)))?;

        let signature = self.send_instruction(&payer, ix).await?;
        info!(
            "Submitted release on {} for transfer {}: {}",
            self.network_id, request.transfer_id, signature
        );
        Ok(signature)
    }

    async fn confirmations(&self, tx_hash: &str) -> Result<TxConfirmation, ChainError> {
        let response: RpcWithContext<Vec<Option<SignatureStatus>>> = self
            .rpc
            .call_required(
                "getSignatureStatuses",
                vec![json!([tx_hash]), json!({"searchTransactionHistory": true})],
            )
            .await?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(TxConfirmation::NotFound),
        };
        if let Some(err) = status.err {
            return Ok(TxConfirmation::Failed(format!("transaction error: {}", err)));
        }
        if status.confirmation_status.as_deref() == Some("processed") {
            return Ok(TxConfirmation::Pending);
        }

        let confirmations = response.context.slot.saturating_sub(status.slot) + 1;
        let finalized = status.confirmation_status.as_deref() == Some("finalized");
        debug!(
            "{} on {}: slot {}, head {}, finalized {}",
            tx_hash, self.network_id, status.slot, response.context.slot, finalized
        );
        Ok(TxConfirmation::Confirmed {
            confirmations,
            finalized,
        })
    }

    async fn lock_events(
        &self,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<LockEvent>, ChainError> {
        let signatures = self.program_signatures_since(from_height).await?;

        let mut events = Vec::new();
        for info in signatures {
            if info.err.is_some() || info.slot < from_height || info.slot > to_height {
                continue;
            }
            let tx = match self.transaction_logs(&info.signature).await? {
                Some(tx) => tx,
                None => continue,
            };
            let meta = match tx.meta {
                Some(meta) if meta.err.is_none() => meta,
                _ => continue,
            };
            for line in meta.log_messages.unwrap_or_default() {
                if !line.starts_with(LOCK_LOG_PREFIX) {
                    continue;
                }
                match instruction::parse_lock_log(&line) {
                    Some(log) => events.push(LockEvent {
                        tx_hash: info.signature.clone(),
                        transfer_key: log.transfer_key,
                        sender: log.sender,
                        recipient: log.recipient,
                        token_address: log.token,
                        base_units: u128::from(log.amount),
                        height: tx.slot,
                    }),
                    None => debug!("Skipping malformed lock log in {}: {}", info.signature, line),
                }
            }
        }

        Ok(events)
    }

    async fn fee_quote(&self) -> Result<NetworkFeeQuote, ChainError> {
        let fee = Amount::from_base_units(u128::from(self.lamports_per_signature), NATIVE_DECIMALS)
            .map_err(|e| ChainError::Configuration(e.to_string()))?;
        Ok(NetworkFeeQuote {
            fee,
            block_time_secs: SLOT_TIME_SECS,
        })
    }

    async fn health(&self) -> ChainHealth {
        let started = Instant::now();
        let health: Result<Option<String>, ChainError> = self.rpc.call("getHealth", vec![]).await;
        let slot = match &health {
            Ok(_) => self.get_slot().await.ok(),
            Err(_) => None,
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        match health {
            Ok(Some(status)) if status == "ok" => ChainHealth {
                network: self.network_id.clone(),
                healthy: true,
                height: slot,
                latency_ms,
                detail: None,
            },
            Ok(other) => ChainHealth {
                network: self.network_id.clone(),
                healthy: false,
                height: slot,
                latency_ms,
                detail: Some(format!("getHealth returned {:?}", other)),
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

/// Decodes a base58 private key string into a Keypair.
///
/// Solana private keys are 64 bytes (seed + public key) encoded as base58.
fn keypair_from_base58(b58: &str) -> Result<Keypair, ChainError> {
    let bytes = bs58::decode(b58)
        .into_vec()
        .map_err(|e| ChainError::Configuration(format!("Invalid base58 payer key: {}", e)))?;
    Keypair::try_from(bytes.as_slice())
        .map_err(|e| ChainError::Configuration(format!("Invalid payer keypair bytes: {}", e)))
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey, ChainError> {
    Pubkey::from_str(value)
        .map_err(|e| ChainError::Rejected(format!("Invalid {} '{}': {}", what, value, e)))
}

fn base_units_u64(amount: &Amount, decimals: u32) -> Result<u64, ChainError> {
    let units = amount
        .to_base_units(decimals)
        .map_err(|e| ChainError::Rejected(e.to_string()))?;
    u64::try_from(units)
        .map_err(|_| ChainError::Rejected(format!("amount {} exceeds u64 base units", amount)))
}
