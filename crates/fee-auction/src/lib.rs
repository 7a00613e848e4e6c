// fee-auction/src/lib.rs

//! English auctions for collected protocol fees
//!
//! Protocol fees accumulate here per token. Anyone can put a token's
//! public balance up for auction against the bidding token; the winning
//! bid is burned, which makes the bidding token deflationary. A small
//! dev cut is skimmed on receipt and a fee on every outbid accrues to a
//! burnable balance.

pub mod house;

pub use house::{Auction, AuctionConfig, AuctionHouse, AuctionStatus, Payment};

/// Result type for auction operations
pub type AuctionResult<T> = Result<T, AuctionError>;

/// Errors that can occur during auction operations
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("Access denied")]
    AccessDenied,

    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Auction is still running")]
    AuctionNotFinished,

    #[error("Auction already finished")]
    AuctionFinished,

    #[error("Bid too low: minimum {minimum}")]
    BidTooLow { minimum: String },

    #[error("Token is whitelisted and cannot be auctioned")]
    TokenWhitelisted,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Arithmetic error: {0}")]
    CoreError(#[from] exchange_core::CoreError),
}
