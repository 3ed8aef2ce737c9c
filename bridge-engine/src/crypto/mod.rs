//! Validator Cryptography
//!
//! Validators attest to a transfer by signing a digest over the fields that
//! define it on both chains: transfer id, source transaction hash, amount and
//! target address. Signatures are Ed25519 and travel base64-encoded; public keys
//! are registered per bridge in the same encoding.
//!
//! Private keys never appear in configuration files. A local validator's key is
//! read from the environment variable the configuration names.

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::BridgeError;
use crate::transfer::TransferRecord;

/// Domain tag mixed into every digest so a bridge signature cannot be replayed
/// as a signature over anything else.
const DIGEST_DOMAIN: &[u8] = b"bridge-transfer-attestation:v1";

// ============================================================================
// DIGEST
// ============================================================================

/// Computes the attestation digest over the transfer's defining fields.
///
/// Each field is length-prefixed so that no two distinct field tuples encode to
/// the same byte string. The amount enters in its canonical decimal form.
///
/// # Arguments
///
/// * `transfer_id` - Transfer identifier
/// * `source_tx_hash` - Lock transaction on the source chain
/// * `amount` - Canonical decimal amount (e.g., "12.5")
/// * `target_address` - Beneficiary on the target chain
pub fn transfer_digest(
    transfer_id: &str,
    source_tx_hash: &str,
    amount: &str,
    target_address: &str,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DIGEST_DOMAIN);
    for field in [transfer_id, source_tx_hash, amount, target_address] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Digest of a stored record. Fails when the source hash is not known yet.
pub fn record_digest(record: &TransferRecord) -> Result<[u8; 32], BridgeError> {
    let source_hash = record.source_transaction_hash.as_deref().ok_or_else(|| {
        BridgeError::ValidationRejected(format!(
            "transfer {} has no source transaction yet",
            record.transfer_id
        ))
    })?;
    Ok(transfer_digest(
        &record.transfer_id,
        source_hash,
        &record.amount.to_string(),
        &record.target_address,
    ))
}

// ============================================================================
// VERIFICATION
// ============================================================================

/// Decodes a base64 Ed25519 public key.
pub fn decode_public_key(public_key_b64: &str) -> Result<VerifyingKey, BridgeError> {
    let bytes = general_purpose::STANDARD
        .decode(public_key_b64)
        .map_err(|e| BridgeError::InvalidRequest(format!("public key is not base64: {}", e)))?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        BridgeError::InvalidRequest(format!(
            "invalid public key length: expected 32 bytes, got {}",
            b.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| BridgeError::InvalidRequest(format!("invalid public key: {}", e)))
}

/// Verifies a base64 signature over `digest` against a base64 public key.
///
/// # Returns
///
/// * `Ok(())` - Signature is valid
/// * `Err(BridgeError::ValidationRejected)` - Malformed input or bad signature
pub fn verify_signature(
    public_key_b64: &str,
    digest: &[u8; 32],
    signature_b64: &str,
) -> Result<(), BridgeError> {
    let key = decode_public_key(public_key_b64)
        .map_err(|e| BridgeError::ValidationRejected(e.to_string()))?;
    let bytes = general_purpose::STANDARD
        .decode(signature_b64)
        .map_err(|e| BridgeError::ValidationRejected(format!("signature is not base64: {}", e)))?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|e| BridgeError::ValidationRejected(format!("malformed signature: {}", e)))?;
    key.verify_strict(digest, &signature)
        .map_err(|_| BridgeError::ValidationRejected("signature verification failed".to_string()))
}

// ============================================================================
// SIGNING
// ============================================================================

/// Signing half of a validator identity.
pub struct ValidatorSigner {
    validator_id: String,
    signing_key: SigningKey,
}

impl ValidatorSigner {
    /// Builds a signer from a base64 32-byte private key.
    pub fn from_base64(validator_id: &str, private_key_b64: &str) -> Result<Self, BridgeError> {
        let bytes = general_purpose::STANDARD.decode(private_key_b64.trim()).map_err(|e| {
            BridgeError::Configuration(format!(
                "validator {} private key is not base64: {}",
                validator_id, e
            ))
        })?;
        let secret: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            BridgeError::Configuration(format!(
                "invalid private key length for validator {}: expected 32 bytes, got {}",
                validator_id,
                b.len()
            ))
        })?;
        Ok(Self {
            validator_id: validator_id.to_string(),
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Reads the private key from the environment variable `key_env`.
    pub fn from_env(validator_id: &str, key_env: &str) -> Result<Self, BridgeError> {
        let value = std::env::var(key_env).map_err(|_| {
            BridgeError::Configuration(format!(
                "environment variable {} (validator {} private key) is not set",
                key_env, validator_id
            ))
        })?;
        Self::from_base64(validator_id, &value)
    }

    pub fn validator_id(&self) -> &str {
        &self.validator_id
    }

    pub fn public_key_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs a digest and returns the base64 signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> String {
        general_purpose::STANDARD.encode(self.signing_key.sign(digest).to_bytes())
    }

    /// Signs the attestation digest of a stored record.
    pub fn sign_transfer(&self, record: &TransferRecord) -> Result<String, BridgeError> {
        Ok(self.sign_digest(&record_digest(record)?))
    }
}

/// Generates a fresh key pair as `(private_b64, public_b64)`.
pub fn generate_keypair() -> (String, String) {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    let signing_key = SigningKey::from_bytes(&secret);
    (
        general_purpose::STANDARD.encode(signing_key.to_bytes()),
        general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes()),
    )
}
