// delegation/src/lib.rs

//! Stake-weighted delegate selection and reward distribution
//!
//! Every native-leg pair keeps one `DelegationStore`:
//! - Share holders vote for a delegate with their full share balance
//! - The delegate with the highest effective weight wins; the runner-up
//!   is kept as the pending candidate so a single re-vote can flip them
//! - Banned delegates count as zero weight until the ban lapses
//! - Candidates pass a validate-or-register check on first use
//!
//! Rewards collected by the pair accrue per share at fixed-point
//! precision and are spread evenly over collecting periods.

pub mod registry;
pub mod rewards;
pub mod store;

pub use registry::DelegateRegistry;
pub use rewards::{RewardState, VoterRewards};
pub use store::{Ban, DelegationStore, Voter};

/// Result type for delegation operations
pub type DelegationResult<T> = Result<T, DelegationError>;

/// Errors that can occur during delegation operations
#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    #[error("Collecting period must be positive")]
    InvalidCollectingPeriod,

    #[error("Invalid delegate candidate: {0}")]
    InvalidDelegate(String),

    #[error("Arithmetic error: {0}")]
    CoreError(#[from] exchange_core::CoreError),
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_imports() {
        // Smoke test
    }
}
