//! Bridge Program Instructions
//!
//! Borsh layouts for the bridge program entry points and the log line the program
//! emits when tokens are locked.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

/// Prefix of the program log line emitted by a successful lock.
pub const LOCK_LOG_PREFIX: &str = "Program log: BridgeLock ";

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum BridgeInstruction {
    LockTokens {
        transfer_id: [u8; 32],
        amount: u64,
        recipient: String,
    },
    ReleaseTokens {
        transfer_id: [u8; 32],
        amount: u64,
    },
}

/// Derives the vault PDA that holds locked tokens for a mint.
pub fn vault_address(program_id: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"vault", mint.as_ref()], program_id).0
}

/// Derives the per-transfer PDA; its existence makes a second release fail.
pub fn transfer_record_address(program_id: &Pubkey, transfer_id: &[u8; 32]) -> Pubkey {
    Pubkey::find_program_address(&[b"transfer", transfer_id], program_id).0
}

/// Builds the LockTokens instruction.
pub fn lock_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    sender: &Pubkey,
    mint: &Pubkey,
    transfer_id: [u8; 32],
    amount: u64,
    recipient: &str,
) -> std::io::Result<Instruction> {
    let data = BridgeInstruction::LockTokens {
        transfer_id,
        amount,
        recipient: recipient.to_string(),
    }
    .try_to_vec()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*sender, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(vault_address(program_id, mint), false),
            AccountMeta::new(transfer_record_address(program_id, &transfer_id), false),
        ],
        data,
    })
}

/// Builds the ReleaseTokens instruction.
pub fn release_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    recipient: &Pubkey,
    mint: &Pubkey,
    transfer_id: [u8; 32],
    amount: u64,
) -> std::io::Result<Instruction> {
    let data = BridgeInstruction::ReleaseTokens {
        transfer_id,
        amount,
    }
    .try_to_vec()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*recipient, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(vault_address(program_id, mint), false),
            AccountMeta::new(transfer_record_address(program_id, &transfer_id), false),
        ],
        data,
    })
}

/// Fields parsed from a BridgeLock log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLog {
    pub transfer_key: String,
    pub sender: String,
    pub token: String,
    pub amount: u64,
    pub recipient: String,
}

/// Parses `Program log: BridgeLock transfer=<hex> sender=<b58> token=<b58> amount=<u64> recipient=<str>`.
pub fn parse_lock_log(line: &str) -> Option<LockLog> {
    let body = line.strip_prefix(LOCK_LOG_PREFIX)?;
    let mut transfer_key = None;
    let mut sender = None;
    let mut token = None;
    let mut amount = None;
    let mut recipient = None;
    for pair in body.split_whitespace() {
        let (key, value) = pair.split_once('=')?;
        match key {
            "transfer" => transfer_key = Some(format!("0x{}", value.trim_start_matches("0x").to_lowercase())),
            "sender" => sender = Some(value.to_string()),
            "token" => token = Some(value.to_string()),
            "amount" => amount = value.parse().ok(),
            "recipient" => recipient = Some(value.to_string()),
            _ => {}
        }
    }
    Some(LockLog {
        transfer_key: transfer_key?,
        sender: sender?,
        token: token?,
        amount: amount?,
        recipient: recipient?,
    })
}
