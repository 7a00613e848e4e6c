// dex-core/src/ledger.rs
//
// Pair shares as a multi-class fungible token: balances keyed by
// (owner, pair_id), operators approved per owner and pair.

use crate::{DexCoreError, DexCoreResult};
use exchange_core::{Amount, PairId};
use exchange_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One destination within a batched transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDestination {
    pub to: Address,
    pub pair_id: PairId,
    pub amount: Amount,
}

/// All transfers out of one owner's balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItem {
    pub from: Address,
    pub destinations: Vec<TransferDestination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperatorUpdate {
    Add {
        owner: Address,
        operator: Address,
        pair_id: PairId,
    },
    Remove {
        owner: Address,
        operator: Address,
        pair_id: PairId,
    },
}

/// Balance query, answered against the share ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRequest {
    pub owner: Address,
    pub pair_id: PairId,
}

/// Share balances across all pairs.
///
/// Invariant: for every pair, the sum of balances equals the pair's
/// `total_shares`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareLedger {
    balances: HashMap<(Address, PairId), Amount>,
    operators: HashMap<(Address, PairId), HashSet<Address>>,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, owner: &Address, pair_id: PairId) -> Amount {
        self.balances
            .get(&(*owner, pair_id))
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn credit(&mut self, owner: Address, pair_id: PairId, amount: Amount) {
        let balance = self.balance_of(&owner, pair_id) + amount;
        self.balances.insert((owner, pair_id), balance);
    }

    pub fn debit(&mut self, owner: &Address, pair_id: PairId, amount: &Amount) -> DexCoreResult<()> {
        let balance = self.balance_of(owner, pair_id);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(DexCoreError::InsufficientBalance)?;
        self.balances.insert((*owner, pair_id), remaining);
        Ok(())
    }

    pub fn is_operator(&self, owner: &Address, operator: &Address, pair_id: PairId) -> bool {
        self.operators
            .get(&(*owner, pair_id))
            .map(|set| set.contains(operator))
            .unwrap_or(false)
    }

    pub fn update_operator(&mut self, update: &OperatorUpdate) {
        match update {
            OperatorUpdate::Add {
                owner,
                operator,
                pair_id,
            } => {
                self.operators
                    .entry((*owner, *pair_id))
                    .or_default()
                    .insert(*operator);
            }
            OperatorUpdate::Remove {
                owner,
                operator,
                pair_id,
            } => {
                if let Some(set) = self.operators.get_mut(&(*owner, *pair_id)) {
                    set.remove(operator);
                }
            }
        }
    }
}

impl OperatorUpdate {
    pub fn owner(&self) -> &Address {
        match self {
            OperatorUpdate::Add { owner, .. } | OperatorUpdate::Remove { owner, .. } => owner,
        }
    }
}
