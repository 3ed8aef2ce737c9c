//! Fee Estimation
//!
//! Pure function over the transfer amount, the bridge fee percentage and the two
//! chains' network fee quotes. Nothing here touches a transfer record.

use chain_clients_common::{Amount, NetworkFeeQuote};

use crate::error::BridgeError;
use crate::transfer::FeeEstimate;

/// Allowance for the validator signing round, in seconds.
pub const VALIDATION_ROUND_SECS: u64 = 30;

/// Bridge fee charged on `amount` at `fee_percentage` percent, rounded down.
pub fn bridge_fee(amount: Amount, fee_percentage: Amount) -> Result<Amount, BridgeError> {
    amount
        .percentage(fee_percentage)
        .ok_or_else(|| BridgeError::InvalidRequest(format!("fee on {} overflows", amount)))
}

/// Builds the fee decomposition for a prospective transfer.
///
/// `total_fee` is exactly the sum of the three parts. The network parts do not
/// depend on the amount and the bridge part rounds down, so the total never
/// decreases as the amount grows.
///
/// # Arguments
///
/// * `amount` - Transfer amount
/// * `fee_percentage` - Bridge fee in percent (e.g., "0.25")
/// * `source` - Network fee quote of the source chain
/// * `target` - Network fee quote of the target chain
/// * `required_confirmations` - Source confirmation depth the bridge waits for
pub fn estimate_fee(
    amount: Amount,
    fee_percentage: Amount,
    source: &NetworkFeeQuote,
    target: &NetworkFeeQuote,
    required_confirmations: u64,
) -> Result<FeeEstimate, BridgeError> {
    let bridge_fee = bridge_fee(amount, fee_percentage)?;
    let total_fee = source
        .fee
        .checked_add(target.fee)
        .and_then(|sum| sum.checked_add(bridge_fee))
        .ok_or_else(|| BridgeError::InvalidRequest("total fee overflows".to_string()))?;

    let estimated_time_seconds = source
        .block_time_secs
        .saturating_mul(required_confirmations.max(1))
        .saturating_add(VALIDATION_ROUND_SECS)
        .saturating_add(target.block_time_secs);

    Ok(FeeEstimate {
        source_network_fee: source.fee,
        target_network_fee: target.fee,
        bridge_fee,
        total_fee,
        estimated_time_seconds,
    })
}
