// dex-core/src/swap.rs

use crate::config::Fees;
use crate::pair::SwapDirection;
use crate::{DexCoreError, DexCoreResult};
use exchange_core::{apply_rate_floor, precision, Amount, PairId, Timestamp};
use exchange_crypto::Address;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// One hop of a swap route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLeg {
    pub pair_id: PairId,
    pub direction: SwapDirection,
}

/// Parameters of a routed swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapParams {
    pub legs: Vec<RouteLeg>,
    pub amount_in: Amount,
    pub min_amount_out: Amount,
    pub receiver: Address,
    pub referrer: Address,
    pub deadline: Timestamp,
}

/// Outcome of pricing one swap leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResult {
    /// Paid to the receiver, taken from the output reserve
    pub amount_out: Amount,
    /// Added to the input reserve (input minus the out-of-pool fees)
    pub pool_in: Amount,
    /// Accrued to the referrer in the input token
    pub interface_fee_amt: Amount,
    /// Accrued to the protocol in the input token
    pub protocol_fee_amt: Amount,
}

/// Price a swap leg against the constant-product curve.
///
/// The whole fee is priced out of the input before the curve is
/// applied; of it, only the swap fee stays in the pool. Rounding dust
/// from the split lands on the protocol side.
pub fn calculate_swap(
    amount_in: &Amount,
    from_reserve: &Amount,
    to_reserve: &Amount,
    fees: &Fees,
) -> DexCoreResult<SwapResult> {
    if amount_in.is_zero() {
        return Err(DexCoreError::ZeroAmount);
    }
    if from_reserve.is_zero() || to_reserve.is_zero() {
        return Err(DexCoreError::InsufficientLiquidity);
    }

    let p = precision();
    let total_fee = fees.total_fee();

    let interface_fee_amt = apply_rate_floor(amount_in, &fees.interface_fee)?;
    let out_of_pool = fees.interface_fee.clone() + fees.protocol_fee.clone();
    let pool_in = apply_rate_floor(amount_in, &p.clone().saturating_sub(&out_of_pool))?;
    let protocol_fee_amt = amount_in
        .saturating_sub(&pool_in)
        .saturating_sub(&interface_fee_amt);

    // The curve must never be priced off more than what actually lands
    // in the pool, or dust inputs could shrink the product.
    let effective_in = (amount_in.clone() * p.clone().saturating_sub(&total_fee))
        .min(pool_in.clone() * p.clone());
    let numerator = effective_in.clone() * to_reserve.clone();
    let denominator = from_reserve.clone() * p + effective_in;
    let amount_out = Amount::new(numerator.inner() / denominator.inner());

    Ok(SwapResult {
        amount_out,
        pool_in,
        interface_fee_amt,
        protocol_fee_amt,
    })
}

/// Invert the curve: the smallest input whose output is `amount_out`.
/// Used to price flash-swap repayments, so it rounds up.
pub fn calculate_swap_input(
    amount_out: &Amount,
    from_reserve: &Amount,
    to_reserve: &Amount,
    fees: &Fees,
) -> DexCoreResult<Amount> {
    if amount_out.is_zero() {
        return Err(DexCoreError::ZeroAmount);
    }
    if amount_out >= to_reserve {
        return Err(DexCoreError::InsufficientLiquidity);
    }

    let p = precision();
    let numerator = amount_out.clone() * from_reserve.clone() * p.clone();
    let denominator =
        to_reserve.saturating_sub(amount_out) * p.saturating_sub(&fees.total_fee());
    let mut required = numerator.inner() / denominator.inner();
    if !(numerator.inner() % denominator.inner()).is_zero() {
        required += 1u32;
    }
    Ok(Amount::new(required))
}
