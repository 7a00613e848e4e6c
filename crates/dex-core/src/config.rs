// dex-core/src/config.rs

use crate::{DexCoreError, DexCoreResult};
use exchange_core::{precision, Amount};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Fee rates, all PRECISION-scaled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fees {
    /// Paid to the referrer named on a swap
    pub interface_fee: Amount,
    /// Stays in the pool for the liquidity providers
    pub swap_fee: Amount,
    /// Routed to the fee auction
    pub protocol_fee: Amount,
    /// Incentive paid to whoever triggers a protocol-fee withdrawal
    pub withdraw_fee_reward: Amount,
}

impl Fees {
    /// Total fee taken off a swap input
    pub fn total_fee(&self) -> Amount {
        self.interface_fee.clone() + self.swap_fee.clone() + self.protocol_fee.clone()
    }

    /// The sum of the swap-path fees must stay below the scale
    pub fn validate(&self) -> DexCoreResult<()> {
        let p = precision();
        if self.total_fee() >= p || self.withdraw_fee_reward > p {
            return Err(DexCoreError::Core(exchange_core::CoreError::RateOutOfRange(
                self.total_fee().to_string(),
            )));
        }
        Ok(())
    }
}

impl Default for Fees {
    fn default() -> Self {
        // 0.25% interface, 0.05% pool, 0.25% protocol, 5% withdrawal reward
        Self {
            interface_fee: rate_from_permyriad(25),
            swap_fee: rate_from_permyriad(5),
            protocol_fee: rate_from_permyriad(25),
            withdraw_fee_reward: rate_from_permyriad(500),
        }
    }
}

/// rate of n basis points (n / 10_000), PRECISION-scaled
fn rate_from_permyriad(n: u64) -> Amount {
    Amount::new(BigUint::from(n) * BigUint::from(10u64).pow(14))
}

/// Top-level exchange parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub fees: Fees,
    /// Blocks per reward collecting period
    pub collecting_period: u64,
    /// Seconds a permit stays valid when no expiry is set
    pub default_expiry: u64,
    /// Upper bound for user-chosen permit expiries, in seconds
    pub max_expiry: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fees: Fees::default(),
            collecting_period: 4096,
            default_expiry: 2_592_000,  // 30 days
            max_expiry: 31_536_000,     // a year
        }
    }
}
