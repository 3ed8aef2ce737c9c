//! Bridge Contract ABI
//!
//! Hand-rolled encoding for the three bridge contract entry points we touch. The
//! contract surface is small and fixed, so a full ABI toolkit is not needed.

use chain_clients_common::ChainError;
use ethereum_types::U256;
use sha3::{Digest, Keccak256};

pub const LOCK_SIGNATURE: &str = "lockTokens(bytes32,address,uint256,string)";
pub const RELEASE_SIGNATURE: &str = "releaseTokens(bytes32,address,address,uint256)";
/// TokensLocked(bytes32 indexed transferId, address indexed sender, address token, uint256 amount, string recipient)
pub const LOCKED_EVENT_SIGNATURE: &str = "TokensLocked(bytes32,address,address,uint256,string)";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// 4-byte function selector.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// 0x-prefixed topic0 for an event signature.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Parses a 0x-prefixed 20-byte address.
pub fn parse_address(value: &str) -> Result<[u8; 20], ChainError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped)
        .map_err(|e| ChainError::Rejected(format!("Invalid EVM address '{}': {}", value, e)))?;
    if bytes.len() != 20 {
        return Err(ChainError::Rejected(format!(
            "Invalid EVM address length for '{}': {} bytes",
            value,
            bytes.len()
        )));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn address_word(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn uint_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// Encodes `lockTokens(bytes32 transferId, address token, uint256 amount, string recipient)`.
pub fn encode_lock(
    transfer_key: &[u8; 32],
    token: &[u8; 20],
    amount: u128,
    recipient: &str,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * 6);
    data.extend_from_slice(&selector(LOCK_SIGNATURE));
    data.extend_from_slice(transfer_key);
    data.extend_from_slice(&address_word(token));
    data.extend_from_slice(&uint_word(U256::from(amount)));
    // head is four words; the string tail starts right after it
    data.extend_from_slice(&uint_word(U256::from(4u64 * 32)));

    let bytes = recipient.as_bytes();
    data.extend_from_slice(&uint_word(U256::from(bytes.len() as u64)));
    data.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    data.extend(std::iter::repeat(0u8).take(padding));
    data
}

/// Encodes `releaseTokens(bytes32 transferId, address token, address recipient, uint256 amount)`.
pub fn encode_release(
    transfer_key: &[u8; 32],
    token: &[u8; 20],
    recipient: &[u8; 20],
    amount: u128,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * 4);
    data.extend_from_slice(&selector(RELEASE_SIGNATURE));
    data.extend_from_slice(transfer_key);
    data.extend_from_slice(&address_word(token));
    data.extend_from_slice(&address_word(recipient));
    data.extend_from_slice(&uint_word(U256::from(amount)));
    data
}

/// Non-indexed fields of a TokensLocked log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedData {
    pub token: String,
    pub amount: u128,
    pub recipient: String,
}

/// Decodes the data section of a TokensLocked log: `(address, uint256, string)`.
pub fn decode_locked_data(data_hex: &str) -> Result<LockedData, ChainError> {
    let stripped = data_hex.strip_prefix("0x").unwrap_or(data_hex);
    let data = hex::decode(stripped)
        .map_err(|e| ChainError::InvalidResponse(format!("Invalid log data hex: {}", e)))?;
    let token = format!("0x{}", hex::encode(&word_at(&data, 0)?[12..]));
    let amount = word_to_u128(word_at(&data, 1)?)?;
    let offset = word_to_usize(word_at(&data, 2)?)?;
    let len_word = data
        .get(offset..offset.saturating_add(32))
        .ok_or_else(|| ChainError::InvalidResponse("String offset out of range".to_string()))?;
    let len = word_to_usize(len_word)?;
    let start = offset.saturating_add(32);
    let raw = data
        .get(start..start.saturating_add(len))
        .ok_or_else(|| ChainError::InvalidResponse("String length out of range".to_string()))?;
    let recipient = String::from_utf8(raw.to_vec())
        .map_err(|e| ChainError::InvalidResponse(format!("Recipient is not UTF-8: {}", e)))?;

    Ok(LockedData {
        token,
        amount,
        recipient,
    })
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    data.get(index * 32..(index + 1) * 32)
        .ok_or_else(|| ChainError::InvalidResponse("Log data too short".to_string()))
}

fn word_to_u128(word: &[u8]) -> Result<u128, ChainError> {
    let value = U256::from_big_endian(word);
    if value > U256::from(u128::MAX) {
        return Err(ChainError::InvalidResponse("uint256 exceeds u128".to_string()));
    }
    Ok(value.low_u128())
}

fn word_to_usize(word: &[u8]) -> Result<usize, ChainError> {
    let value = word_to_u128(word)?;
    usize::try_from(value)
        .map_err(|_| ChainError::InvalidResponse("offset exceeds usize".to_string()))
}
