// delegation/src/registry.rs

use crate::{DelegationError, DelegationResult};
use exchange_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Delegate candidates known to be usable.
///
/// A candidate is vetted once, on first use, and remembered; later
/// votes for the same candidate skip the check. The zero address can
/// never act as a delegate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegateRegistry {
    validated: HashSet<Address>,
}

impl DelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_validated(&self, delegate: &Address) -> bool {
        self.validated.contains(delegate)
    }

    /// Vet a candidate, registering it on first sight
    pub fn validate_or_register(&mut self, delegate: Address) -> DelegationResult<()> {
        if self.validated.contains(&delegate) {
            return Ok(());
        }
        if delegate == Address::zero() {
            return Err(DelegationError::InvalidDelegate(delegate.to_hex()));
        }
        self.validated.insert(delegate);
        debug!(%delegate, "delegate registered");
        Ok(())
    }
}
