// delegation/src/rewards.rs
//
// Per-pair reward accounting. Rewards received during one collecting
// period are banked, then spread evenly over the following period(s)
// so that a holder's take is proportional to shares held over time.
// All `_f`-suffixed fields are scaled by PRECISION.

use crate::{DelegationError, DelegationResult};
use exchange_core::{precision, Amount, BlockNumber};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Accrual state for one pair's reward bucket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardState {
    /// Cumulative reward per share, PRECISION-scaled, never decreases
    pub reward_per_share_f: Amount,
    /// Emission rate for the running period, PRECISION-scaled
    pub reward_per_block_f: Amount,
    /// Rewards banked for the next period
    pub next_period_reward: Amount,
    pub last_update_level: BlockNumber,
    pub period_end: BlockNumber,
}

/// One holder's accrued rewards
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoterRewards {
    /// Accrued but unclaimed reward, PRECISION-scaled
    pub reward_f: Amount,
    /// Checkpoint: reward_per_share_f × balance at last touch
    pub reward_paid_f: Amount,
}

impl RewardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bank a reward deposit for the next collecting period
    pub fn fill(&mut self, amount: Amount) {
        self.next_period_reward = self.next_period_reward.clone() + amount;
    }

    /// Advance the accumulator to `level`.
    ///
    /// Must be called before any share balance changes so the old
    /// balances earn at the old rate.
    pub fn update(
        &mut self,
        total_shares: &Amount,
        level: BlockNumber,
        collecting_period: u64,
    ) -> DelegationResult<()> {
        if collecting_period == 0 {
            return Err(DelegationError::InvalidCollectingPeriod);
        }

        if !total_shares.is_zero() {
            let accrue_until = level.min(self.period_end);
            if accrue_until > self.last_update_level {
                let blocks = Amount::from_u64(accrue_until - self.last_update_level);
                let earned =
                    exchange_core::mul_div_floor(&blocks, &self.reward_per_block_f, total_shares)?;
                self.reward_per_share_f = self.reward_per_share_f.clone() + earned;
            }

            if level > self.period_end {
                // Spread the banked reward over however many whole
                // periods it takes to reach past `level`
                let periods = (level - self.period_end) / collecting_period + 1;
                let span = periods * collecting_period;
                self.reward_per_block_f = exchange_core::mul_div_floor(
                    &self.next_period_reward,
                    &precision(),
                    &Amount::from_u64(span),
                )?;

                let blocks = Amount::from_u64(level - self.period_end);
                let earned =
                    exchange_core::mul_div_floor(&blocks, &self.reward_per_block_f, total_shares)?;
                self.reward_per_share_f = self.reward_per_share_f.clone() + earned;

                self.period_end += span;
                self.next_period_reward = Amount::zero();
                debug!(
                    period_end = self.period_end,
                    rate = %self.reward_per_block_f,
                    "started new reward period"
                );
            }
        }

        self.last_update_level = level;
        Ok(())
    }

    /// Settle a holder's accrual across a balance change.
    ///
    /// `balance_before` is the balance the holder had since the last
    /// touch; `balance_after` is the balance from now on. Call with
    /// equal balances to settle without a change.
    pub fn update_voter(
        &self,
        voter: &mut VoterRewards,
        balance_before: &Amount,
        balance_after: &Amount,
    ) {
        let earned_f = self.reward_per_share_f.clone() * balance_before.clone();
        voter.reward_f = voter.reward_f.clone() + earned_f.saturating_sub(&voter.reward_paid_f);
        voter.reward_paid_f = self.reward_per_share_f.clone() * balance_after.clone();
    }

    /// Pay out the whole-unit part of a holder's accrued reward,
    /// keeping the fractional remainder
    pub fn claim(&self, voter: &mut VoterRewards) -> DelegationResult<Amount> {
        let p = precision();
        let payout = exchange_core::mul_div_floor(&voter.reward_f, &Amount::from_u64(1), &p)?;
        let paid_f = payout.clone() * p;
        voter.reward_f = voter.reward_f.saturating_sub(&paid_f);
        Ok(payout)
    }
}
