// dex-core/src/oracle.rs
//
// Time-weighted cumulative price accumulators, updated before every
// reserve mutation so the pre-trade price is what gets weighted.

use crate::pair::Pair;
use crate::DexCoreResult;
use exchange_core::{mul_div_floor, precision, Amount, Timestamp};

/// Fold the time since the last update into both accumulators.
///
/// With either reserve empty there is no price to record; the
/// timestamp still advances so the empty interval is never counted.
pub fn update_cumulative_prices(pair: &mut Pair, now: Timestamp) -> DexCoreResult<()> {
    let elapsed = now.saturating_sub(pair.last_update);
    if elapsed > 0 && !pair.reserve_a.is_zero() && !pair.reserve_b.is_zero() {
        let weight = Amount::from_u64(elapsed) * precision();
        let delta_a = mul_div_floor(&pair.reserve_b, &weight, &pair.reserve_a)?;
        let delta_b = mul_div_floor(&pair.reserve_a, &weight, &pair.reserve_b)?;
        pair.price_a_cumulative = pair.price_a_cumulative.clone() + delta_a;
        pair.price_b_cumulative = pair.price_b_cumulative.clone() + delta_b;
    }
    pair.last_update = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_core::TokenId;
    use exchange_crypto::Address;

    fn test_pair(reserve_a: u64, reserve_b: u64) -> Pair {
        let mut pair = Pair::new(
            TokenId::Single(Address::new([1; 20])),
            TokenId::Single(Address::new([2; 20])),
            100,
        );
        pair.reserve_a = Amount::from_u64(reserve_a);
        pair.reserve_b = Amount::from_u64(reserve_b);
        pair.total_shares = Amount::from_u64(1);
        pair
    }

    #[test]
    fn test_accumulates_price_times_elapsed() {
        let mut pair = test_pair(1000, 2000);
        update_cumulative_prices(&mut pair, 110).unwrap();

        // price of a in b is 2, weighted by 10 seconds
        let expected_a = Amount::from_u64(20) * precision();
        let expected_b = Amount::from_u64(5) * precision();
        assert_eq!(pair.price_a_cumulative, expected_a);
        assert_eq!(pair.price_b_cumulative, expected_b);
        assert_eq!(pair.last_update, 110);
    }

    #[test]
    fn test_zero_elapsed_is_a_noop() {
        let mut pair = test_pair(1000, 2000);
        update_cumulative_prices(&mut pair, 100).unwrap();
        assert!(pair.price_a_cumulative.is_zero());
    }

    #[test]
    fn test_empty_reserve_only_advances_clock() {
        let mut pair = test_pair(0, 2000);
        update_cumulative_prices(&mut pair, 150).unwrap();
        assert!(pair.price_a_cumulative.is_zero());
        assert!(pair.price_b_cumulative.is_zero());
        assert_eq!(pair.last_update, 150);
    }

    #[test]
    fn test_fractional_price_floors() {
        let mut pair = test_pair(3, 1);
        update_cumulative_prices(&mut pair, 101).unwrap();
        // 1/3 of PRECISION, floored
        let expected = Amount::new(precision().inner() / 3u32);
        assert_eq!(pair.price_a_cumulative, expected);
    }
}
