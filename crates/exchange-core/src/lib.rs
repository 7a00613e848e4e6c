// exchange-core/src/lib.rs

//! Shared primitives for the AMM exchange core
//!
//! This crate provides:
//! - `Amount`: arbitrary-precision token amounts backed by `BigUint`
//! - Fixed-point arithmetic with explicit floor/ceiling rounding
//! - `TokenId`: the closed set of token kinds with a total order

pub mod math;
pub mod token;
pub mod types;

pub use math::{apply_rate_ceil, apply_rate_floor, mul_div_ceil, mul_div_floor, precision, PRECISION_EXP};
pub use token::TokenId;
pub use types::{Amount, BlockNumber, PairId, Timestamp};

/// Result type for primitive operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the shared primitives
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Amount underflow")]
    Underflow,

    #[error("Rate out of range: {0}")]
    RateOutOfRange(String),
}
