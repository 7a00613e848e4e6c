// exchange-core/src/math.rs
//
// Fixed-point helpers shared by pricing, fee splitting and reward
// accounting. Rates are expressed against PRECISION = 10^18, so a
// 0.3% fee is stored as 3 * 10^15.

use crate::{CoreError, CoreResult};
use crate::types::Amount;
use num_bigint::BigUint;
use num_traits::Zero;

/// Decimal exponent of the fixed-point scale
pub const PRECISION_EXP: u32 = 18;

/// The fixed-point scale, 10^18
pub fn precision() -> Amount {
    Amount::new(BigUint::from(10u64).pow(PRECISION_EXP))
}

/// floor(a * b / d)
pub fn mul_div_floor(a: &Amount, b: &Amount, d: &Amount) -> CoreResult<Amount> {
    if d.is_zero() {
        return Err(CoreError::DivisionByZero);
    }
    Ok(Amount::new(a.inner() * b.inner() / d.inner()))
}

/// ceil(a * b / d)
pub fn mul_div_ceil(a: &Amount, b: &Amount, d: &Amount) -> CoreResult<Amount> {
    if d.is_zero() {
        return Err(CoreError::DivisionByZero);
    }
    let num = a.inner() * b.inner();
    let den = d.inner();
    let mut q = &num / den;
    if !(&num % den).is_zero() {
        q += 1u32;
    }
    Ok(Amount::new(q))
}

/// floor(amount * rate / PRECISION), with rate validated against the scale
pub fn apply_rate_floor(amount: &Amount, rate: &Amount) -> CoreResult<Amount> {
    let p = precision();
    if rate.inner() > p.inner() {
        return Err(CoreError::RateOutOfRange(rate.to_string()));
    }
    mul_div_floor(amount, rate, &p)
}

/// ceil(amount * rate / PRECISION)
pub fn apply_rate_ceil(amount: &Amount, rate: &Amount) -> CoreResult<Amount> {
    let p = precision();
    if rate.inner() > p.inner() {
        return Err(CoreError::RateOutOfRange(rate.to_string()));
    }
    mul_div_ceil(amount, rate, &p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: u64) -> Amount {
        Amount::from_u64(v)
    }

    #[test]
    fn test_mul_div_floor() {
        let r = mul_div_floor(&amt(7), &amt(3), &amt(2)).unwrap();
        assert_eq!(r, amt(10));
    }

    #[test]
    fn test_mul_div_ceil() {
        let r = mul_div_ceil(&amt(7), &amt(3), &amt(2)).unwrap();
        assert_eq!(r, amt(11));

        // exact division rounds neither way
        let r = mul_div_ceil(&amt(6), &amt(3), &amt(2)).unwrap();
        assert_eq!(r, amt(9));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            mul_div_floor(&amt(1), &amt(1), &Amount::zero()),
            Err(CoreError::DivisionByZero)
        ));
    }

    #[test]
    fn test_apply_rate() {
        // 0.25% of 1000 = 2.5 -> floor 2, ceil 3
        let rate = Amount::new(num_bigint::BigUint::from(25u64) * num_bigint::BigUint::from(10u64).pow(14));
        assert_eq!(apply_rate_floor(&amt(1000), &rate).unwrap(), amt(2));
        assert_eq!(apply_rate_ceil(&amt(1000), &rate).unwrap(), amt(3));
    }

    #[test]
    fn test_rate_out_of_range() {
        let over = precision().checked_add(&amt(1)).unwrap();
        assert!(matches!(
            apply_rate_floor(&amt(10), &over),
            Err(CoreError::RateOutOfRange(_))
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_floor_and_ceil_bracket_the_quotient(
                a in 0u64..1_000_000_000,
                b in 0u64..1_000_000_000,
                d in 1u64..1_000_000_000,
            ) {
                let floor = mul_div_floor(&amt(a), &amt(b), &amt(d)).unwrap();
                let ceil = mul_div_ceil(&amt(a), &amt(b), &amt(d)).unwrap();

                prop_assert!(ceil.saturating_sub(&floor) <= amt(1));
                // floor * d <= a * b <= ceil * d
                let product = amt(a) * amt(b);
                prop_assert!(floor * amt(d) <= product);
                prop_assert!(ceil * amt(d) >= product);
            }
        }
    }
}
