// dex-core/src/fees.rs

use exchange_core::{Amount, TokenId};
use exchange_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Out-of-pool fee balances accrued from swaps.
///
/// Interface fees belong to the referrer who routed the trade;
/// protocol fees belong to nobody until somebody triggers the
/// withdrawal that ships them to the auction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeBalances {
    interface: HashMap<(TokenId, Address), Amount>,
    protocol: HashMap<TokenId, Amount>,
}

impl FeeBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interface_balance(&self, token: &TokenId, referrer: &Address) -> Amount {
        self.interface
            .get(&(token.clone(), *referrer))
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn protocol_balance(&self, token: &TokenId) -> Amount {
        self.protocol
            .get(token)
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn accrue_interface(&mut self, token: &TokenId, referrer: &Address, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        let balance = self.interface_balance(token, referrer) + amount;
        self.interface.insert((token.clone(), *referrer), balance);
    }

    pub fn accrue_protocol(&mut self, token: &TokenId, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        let balance = self.protocol_balance(token) + amount;
        self.protocol.insert(token.clone(), balance);
    }

    /// Zero and return a referrer's balance in one token
    pub fn take_interface(&mut self, token: &TokenId, referrer: &Address) -> Amount {
        self.interface
            .remove(&(token.clone(), *referrer))
            .unwrap_or_else(Amount::zero)
    }

    /// Zero and return the protocol balance in one token
    pub fn take_protocol(&mut self, token: &TokenId) -> Amount {
        self.protocol.remove(token).unwrap_or_else(Amount::zero)
    }
}
