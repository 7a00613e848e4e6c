// dex-core/src/permit.rs
//
// Off-chain approvals: an owner signs the hash of a call's parameters
// and anyone can submit the signature; the first unauthorized call
// matching the hash then executes on the owner's behalf.

use crate::{DexCoreError, DexCoreResult};
use exchange_core::Timestamp;
use exchange_crypto::{Address, Hash, Hashable, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered one-shot approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit {
    pub created_at: Timestamp,
    /// Override of the issuer's expiry for this permit alone, seconds
    pub expiry: Option<u64>,
}

/// What a permit signature commits to: the exchange identity, the
/// issuer's running counter, and the parameter hash. The counter makes
/// every signed payload unique.
#[derive(Serialize)]
struct PermitPayload<'a> {
    self_id: &'a Address,
    counter: u64,
    param_hash: &'a Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitStore {
    permits: HashMap<(Address, Hash), Permit>,
    /// Per-issuer default expiry overrides, seconds
    expiries: HashMap<Address, u64>,
    counter: u64,
    default_expiry: u64,
    max_expiry: u64,
}

impl PermitStore {
    pub fn new(default_expiry: u64, max_expiry: u64) -> Self {
        Self {
            permits: HashMap::new(),
            expiries: HashMap::new(),
            counter: 0,
            default_expiry,
            max_expiry,
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn permit(&self, issuer: &Address, param_hash: &Hash) -> Option<&Permit> {
        self.permits.get(&(*issuer, *param_hash))
    }

    /// The message a valid signature for the *next* permit must cover
    pub fn expected_message(&self, self_id: &Address, param_hash: &Hash) -> DexCoreResult<Hash> {
        let payload = PermitPayload {
            self_id,
            counter: self.counter,
            param_hash,
        };
        Ok(bincode::serialize(&payload)?.hash())
    }

    /// Register a signed permit. Returns the issuer derived from the key.
    pub fn submit(
        &mut self,
        self_id: &Address,
        public_key: &PublicKey,
        signature: &Signature,
        param_hash: Hash,
        now: Timestamp,
    ) -> DexCoreResult<Address> {
        let message = self.expected_message(self_id, &param_hash)?;
        if !public_key.verify(message.as_bytes(), signature) {
            return Err(DexCoreError::InvalidSignature);
        }
        let issuer = public_key.to_address();

        if let Some(existing) = self.permits.get(&(issuer, param_hash)) {
            if !self.is_expired(&issuer, existing, now) {
                return Err(DexCoreError::PermitAlreadyExists);
            }
        }

        self.permits.insert(
            (issuer, param_hash),
            Permit {
                created_at: now,
                expiry: None,
            },
        );
        self.counter += 1;
        Ok(issuer)
    }

    /// Fail unless a live permit matches `param_hash`. Touches nothing,
    /// so callers can validate a whole batch before spending.
    pub fn check(
        &self,
        issuer: &Address,
        param_hash: &Hash,
        now: Timestamp,
    ) -> DexCoreResult<()> {
        let permit = self
            .permits
            .get(&(*issuer, *param_hash))
            .ok_or(DexCoreError::PermitNotFound)?;
        if self.is_expired(issuer, permit, now) {
            return Err(DexCoreError::PermitExpired);
        }
        Ok(())
    }

    /// Spend the permit matching `param_hash`, at most once
    pub fn consume(
        &mut self,
        issuer: &Address,
        param_hash: &Hash,
        now: Timestamp,
    ) -> DexCoreResult<()> {
        let permit = self
            .permits
            .get(&(*issuer, *param_hash))
            .ok_or(DexCoreError::PermitNotFound)?;
        if self.is_expired(issuer, permit, now) {
            self.permits.remove(&(*issuer, *param_hash));
            return Err(DexCoreError::PermitExpired);
        }
        self.permits.remove(&(*issuer, *param_hash));
        Ok(())
    }

    /// Set the issuer's default expiry, or one permit's expiry
    pub fn set_expiry(
        &mut self,
        issuer: &Address,
        expiry: u64,
        param_hash: Option<Hash>,
    ) -> DexCoreResult<()> {
        if expiry > self.max_expiry {
            return Err(DexCoreError::ExpiryTooLong);
        }
        match param_hash {
            Some(hash) => {
                let permit = self
                    .permits
                    .get_mut(&(*issuer, hash))
                    .ok_or(DexCoreError::PermitNotFound)?;
                permit.expiry = Some(expiry);
            }
            None => {
                self.expiries.insert(*issuer, expiry);
            }
        }
        Ok(())
    }

    fn effective_expiry(&self, issuer: &Address, permit: &Permit) -> u64 {
        permit
            .expiry
            .or_else(|| self.expiries.get(issuer).copied())
            .unwrap_or(self.default_expiry)
    }

    fn is_expired(&self, issuer: &Address, permit: &Permit, now: Timestamp) -> bool {
        now >= permit.created_at + self.effective_expiry(issuer, permit)
    }
}
