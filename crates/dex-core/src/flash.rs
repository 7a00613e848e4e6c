// dex-core/src/flash.rs

use crate::config::Fees;
use crate::pair::{Pair, Side};
use crate::swap::calculate_swap_input;
use crate::DexCoreResult;
use exchange_core::{apply_rate_ceil, Amount, PairId};
use exchange_crypto::Address;
use serde::{Deserialize, Serialize};

/// How a flash swap must be repaid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashSwapRule {
    /// Return the lent token plus the full fee on top
    RepaySameToken,
    /// Pay the opposite token, priced like a swap for the lent amount
    RepayOppositeToken,
}

/// An open flash-swap chain awaiting its callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingFlashSwap {
    pub pair_id: PairId,
    pub rule: FlashSwapRule,
    /// Side the loan was taken from
    pub lent_side: Side,
    /// Side the repayment lands on
    pub repay_side: Side,
    pub amount_out: Amount,
    pub required: Amount,
    pub referrer: Address,
}

/// The smallest repayment that keeps the pool whole, rounded up
pub fn required_repayment(
    rule: FlashSwapRule,
    pair: &Pair,
    lent_side: Side,
    amount_out: &Amount,
    fees: &Fees,
) -> DexCoreResult<Amount> {
    match rule {
        FlashSwapRule::RepaySameToken => {
            let fee = apply_rate_ceil(amount_out, &fees.total_fee())?;
            Ok(amount_out.clone() + fee)
        }
        FlashSwapRule::RepayOppositeToken => calculate_swap_input(
            amount_out,
            pair.reserve(lent_side.opposite()),
            pair.reserve(lent_side),
            fees,
        ),
    }
}

impl FlashSwapRule {
    pub fn repay_side(self, lent_side: Side) -> Side {
        match self {
            FlashSwapRule::RepaySameToken => lent_side,
            FlashSwapRule::RepayOppositeToken => lent_side.opposite(),
        }
    }
}
