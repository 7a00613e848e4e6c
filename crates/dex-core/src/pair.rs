// dex-core/src/pair.rs

use exchange_core::{Amount, Timestamp, TokenId};
use serde::{Deserialize, Serialize};

/// One of the two legs of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Direction of a swap leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    AToB,
    BToA,
}

impl SwapDirection {
    pub fn input_side(self) -> Side {
        match self {
            SwapDirection::AToB => Side::A,
            SwapDirection::BToA => Side::B,
        }
    }

    pub fn output_side(self) -> Side {
        self.input_side().opposite()
    }
}

/// A registered constant-product pool.
///
/// Tokens are stored in canonical order (`token_a < token_b`), so a
/// native leg is always `token_a`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub reserve_a: Amount,
    pub reserve_b: Amount,
    pub total_shares: Amount,
    pub price_a_cumulative: Amount,
    pub price_b_cumulative: Amount,
    pub last_update: Timestamp,
}

impl Pair {
    pub fn new(token_a: TokenId, token_b: TokenId, now: Timestamp) -> Self {
        Self {
            token_a,
            token_b,
            reserve_a: Amount::zero(),
            reserve_b: Amount::zero(),
            total_shares: Amount::zero(),
            price_a_cumulative: Amount::zero(),
            price_b_cumulative: Amount::zero(),
            last_update: now,
        }
    }

    /// A drained pair holds no shares; it rejects swaps and invests
    /// until somebody re-seeds it
    pub fn is_drained(&self) -> bool {
        self.total_shares.is_zero()
    }

    pub fn has_native_leg(&self) -> bool {
        self.token_a.is_native()
    }

    pub fn token(&self, side: Side) -> &TokenId {
        match side {
            Side::A => &self.token_a,
            Side::B => &self.token_b,
        }
    }

    pub fn reserve(&self, side: Side) -> &Amount {
        match side {
            Side::A => &self.reserve_a,
            Side::B => &self.reserve_b,
        }
    }

    pub fn reserve_mut(&mut self, side: Side) -> &mut Amount {
        match side {
            Side::A => &mut self.reserve_a,
            Side::B => &mut self.reserve_b,
        }
    }

    /// The constant-product invariant value
    pub fn invariant(&self) -> Amount {
        self.reserve_a.clone() * self.reserve_b.clone()
    }
}
