// dex-core/src/lib.rs

//! Multi-pool constant-product exchange core
//!
//! This crate implements the deterministic business logic of the
//! exchange:
//! - Pair registry with constant-product pricing and a three-way fee
//!   split (interface / pool / protocol)
//! - Liquidity shares with a fungible-token surface and off-chain
//!   permits for gasless approvals
//! - Cumulative-price oracle accumulators
//! - Flash swaps driven by a continuation chain under a re-entrancy
//!   guard
//! - Stake-weighted delegate voting and reward pass-through for pairs
//!   with a native leg
//!
//! The core neither stores to disk nor moves tokens itself: every
//! entrypoint returns the [`Effect`]s the surrounding substrate must
//! carry out atomically.

pub mod config;
pub mod core;
pub mod fees;
pub mod flash;
pub mod ledger;
pub mod oracle;
pub mod pair;
pub mod permit;
pub mod swap;

pub use config::{ExchangeConfig, Fees};
pub use self::core::{CallContext, Continuation, DexCore, Effect};
pub use flash::{FlashSwapRule, PendingFlashSwap};
pub use ledger::{BalanceRequest, OperatorUpdate, ShareLedger, TransferDestination, TransferItem};
pub use pair::{Pair, Side, SwapDirection};
pub use permit::{Permit, PermitStore};
pub use swap::{RouteLeg, SwapParams, SwapResult};

/// Result type for exchange-core operations
pub type DexCoreResult<T> = Result<T, DexCoreError>;

/// Errors that can occur during exchange operations
#[derive(Debug, thiserror::Error)]
pub enum DexCoreError {
    #[error("Access denied")]
    AccessDenied,

    #[error("Re-entrancy detected")]
    ReentrancyDetected,

    #[error("No flash-swap chain is open")]
    NotEntered,

    #[error("Pair not listed: {0}")]
    PairNotListed(u64),

    #[error("Pair already listed")]
    PairAlreadyListed,

    #[error("Pair tokens must be in strictly ascending order")]
    WrongTokenOrder,

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Slippage tolerance exceeded")]
    SlippageExceeded,

    #[error("Malformed route: {0}")]
    RouteMalformed(String),

    #[error("Referrer and receiver must differ")]
    SelfReferral,

    #[error("Deadline expired")]
    DeadlineExpired,

    #[error("Native payment does not match the declared amount")]
    UnexpectedNativePayment,

    #[error("Delegation target is banned")]
    DelegationTargetBanned,

    #[error("Pair has no native leg")]
    NoNativeLeg,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Permit already exists")]
    PermitAlreadyExists,

    #[error("Permit expired")]
    PermitExpired,

    #[error("Permit not found")]
    PermitNotFound,

    #[error("Expiry exceeds the allowed maximum")]
    ExpiryTooLong,

    #[error("No pending flash swap")]
    NoPendingFlashSwap,

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error(transparent)]
    Delegation(#[from] delegation::DelegationError),

    #[error(transparent)]
    Auction(#[from] fee_auction::AuctionError),

    #[error("Arithmetic error: {0}")]
    Core(#[from] exchange_core::CoreError),
}
