// delegation/src/store.rs

use exchange_core::{Amount, Timestamp};
use exchange_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One share holder's standing vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    pub candidate: Option<Address>,
    pub votes: Amount,
}

/// An active ban on a delegate; `period == 0` means no ban
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ban {
    pub start: Timestamp,
    pub period: u64,
}

impl Ban {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.start + self.period > now
    }
}

/// Vote bookkeeping for one pair
///
/// Invariant: each delegate's entry in `delegates` equals the sum of the
/// `votes` of the voters whose `candidate` is that delegate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegationStore {
    voters: HashMap<Address, Voter>,
    delegates: HashMap<Address, Amount>,
    bans: HashMap<Address, Ban>,
    current_delegate: Option<Address>,
    next_candidate: Option<Address>,
}

impl DelegationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_delegate(&self) -> Option<Address> {
        self.current_delegate
    }

    pub fn next_candidate(&self) -> Option<Address> {
        self.next_candidate
    }

    pub fn voter(&self, address: &Address) -> Option<&Voter> {
        self.voters.get(address)
    }

    /// Aggregated weight of a delegate, ignoring bans
    pub fn votes_of(&self, delegate: &Address) -> Amount {
        self.delegates.get(delegate).cloned().unwrap_or_else(Amount::zero)
    }

    pub fn is_banned(&self, delegate: &Address, now: Timestamp) -> bool {
        self.bans
            .get(delegate)
            .map(|ban| ban.is_active(now))
            .unwrap_or(false)
    }

    /// Weight a delegate competes with: aggregated votes, or zero while banned
    pub fn effective_weight(&self, delegate: &Address, now: Timestamp) -> Amount {
        if self.is_banned(delegate, now) {
            Amount::zero()
        } else {
            self.votes_of(delegate)
        }
    }

    fn weight_of_slot(&self, slot: Option<Address>, now: Timestamp) -> Amount {
        slot.map(|d| self.effective_weight(&d, now))
            .unwrap_or_else(Amount::zero)
    }

    /// Register or refresh a vote with the voter's current share balance.
    ///
    /// Called on every balance change of a voting holder, with the new
    /// balance as `weight`. Returns the new current delegate when the
    /// vote flipped it, so the caller can emit a delegation effect.
    pub fn vote(
        &mut self,
        voter: Address,
        candidate: Address,
        weight: Amount,
        now: Timestamp,
    ) -> Option<Address> {
        // Move the voter's weight between aggregates
        if let Some(previous) = self.voters.get(&voter) {
            if let Some(old_candidate) = previous.candidate {
                let remaining = self
                    .votes_of(&old_candidate)
                    .saturating_sub(&previous.votes);
                self.delegates.insert(old_candidate, remaining);
            }
        }
        let aggregated = self.votes_of(&candidate) + weight.clone();
        self.delegates.insert(candidate, aggregated);
        self.voters.insert(
            voter,
            Voter {
                candidate: Some(candidate),
                votes: weight,
            },
        );

        let before = self.current_delegate;
        self.reselect(candidate, now);

        if self.current_delegate != before {
            debug!(
                delegate = ?self.current_delegate,
                previous = ?before,
                "current delegate changed"
            );
            self.current_delegate
        } else {
            None
        }
    }

    fn reselect(&mut self, candidate: Address, now: Timestamp) {
        let current_weight = self.weight_of_slot(self.current_delegate, now);
        let next_weight = self.weight_of_slot(self.next_candidate, now);
        let candidate_weight = self.effective_weight(&candidate, now);

        if self.current_delegate == Some(candidate) {
            // The current delegate's own weight moved; the pending
            // candidate may have overtaken it
            if next_weight > candidate_weight {
                std::mem::swap(&mut self.current_delegate, &mut self.next_candidate);
            }
        } else if candidate_weight > current_weight {
            self.next_candidate = self.current_delegate;
            self.current_delegate = Some(candidate);
        } else if candidate_weight > next_weight && self.next_candidate != Some(candidate) {
            self.next_candidate = Some(candidate);
        }
    }

    /// Ban a delegate for `period` seconds starting now; zero unbans.
    /// Privilege is checked by the caller.
    pub fn ban(&mut self, delegate: Address, period: u64, now: Timestamp) {
        if period == 0 {
            self.bans.remove(&delegate);
        } else {
            self.bans.insert(delegate, Ban { start: now, period });
        }
        debug!(%delegate, period, "delegate ban updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn amt(v: u64) -> Amount {
        Amount::from_u64(v)
    }

    #[test]
    fn test_first_vote_sets_current() {
        let mut store = DelegationStore::new();
        let changed = store.vote(addr(1), addr(10), amt(100), 0);

        assert_eq!(changed, Some(addr(10)));
        assert_eq!(store.current_delegate(), Some(addr(10)));
        assert_eq!(store.next_candidate(), None);
        assert_eq!(store.votes_of(&addr(10)), amt(100));
    }

    #[test]
    fn test_weaker_candidate_becomes_next() {
        let mut store = DelegationStore::new();
        store.vote(addr(1), addr(10), amt(100), 0);
        let changed = store.vote(addr(2), addr(11), amt(50), 0);

        assert_eq!(changed, None);
        assert_eq!(store.current_delegate(), Some(addr(10)));
        assert_eq!(store.next_candidate(), Some(addr(11)));
    }

    #[test]
    fn test_stronger_candidate_promoted() {
        let mut store = DelegationStore::new();
        store.vote(addr(1), addr(10), amt(100), 0);
        store.vote(addr(2), addr(11), amt(50), 0);

        let changed = store.vote(addr(2), addr(11), amt(200), 0);

        assert_eq!(changed, Some(addr(11)));
        assert_eq!(store.current_delegate(), Some(addr(11)));
        assert_eq!(store.next_candidate(), Some(addr(10)));
        // the re-vote replaced the old weight, it did not add to it
        assert_eq!(store.votes_of(&addr(11)), amt(200));
    }

    #[test]
    fn test_current_losing_weight_swaps_with_next() {
        let mut store = DelegationStore::new();
        store.vote(addr(1), addr(10), amt(100), 0);
        store.vote(addr(2), addr(11), amt(60), 0);

        // holder 1 divests down to 40 shares and re-votes
        let changed = store.vote(addr(1), addr(10), amt(40), 0);

        assert_eq!(changed, Some(addr(11)));
        assert_eq!(store.current_delegate(), Some(addr(11)));
        assert_eq!(store.next_candidate(), Some(addr(10)));
    }

    #[test]
    fn test_banned_delegate_has_zero_effective_weight() {
        let mut store = DelegationStore::new();
        store.vote(addr(1), addr(10), amt(100), 0);
        store.vote(addr(2), addr(11), amt(60), 0);

        store.ban(addr(10), 1000, 0);
        assert!(store.is_banned(&addr(10), 10));
        assert_eq!(store.effective_weight(&addr(10), 10), Amount::zero());
        // the ban itself does not flip the delegate
        assert_eq!(store.current_delegate(), Some(addr(10)));

        // the next vote does
        let changed = store.vote(addr(3), addr(11), amt(10), 10);
        assert_eq!(changed, Some(addr(11)));
        assert_eq!(store.current_delegate(), Some(addr(11)));
    }

    #[test]
    fn test_ban_expires() {
        let mut store = DelegationStore::new();
        store.vote(addr(1), addr(10), amt(100), 0);
        store.ban(addr(10), 1000, 0);

        assert!(store.is_banned(&addr(10), 999));
        assert!(!store.is_banned(&addr(10), 1000));
        assert_eq!(store.effective_weight(&addr(10), 1000), amt(100));
    }

    #[test]
    fn test_zero_period_unbans() {
        let mut store = DelegationStore::new();
        store.ban(addr(10), 1000, 0);
        assert!(store.is_banned(&addr(10), 5));

        store.ban(addr(10), 0, 5);
        assert!(!store.is_banned(&addr(10), 5));
    }

    #[test]
    fn test_aggregate_tracks_voter_sum() {
        let mut store = DelegationStore::new();
        store.vote(addr(1), addr(10), amt(30), 0);
        store.vote(addr(2), addr(10), amt(20), 0);
        assert_eq!(store.votes_of(&addr(10)), amt(50));

        // voter 1 switches delegates; weight follows
        store.vote(addr(1), addr(11), amt(30), 0);
        assert_eq!(store.votes_of(&addr(10)), amt(20));
        assert_eq!(store.votes_of(&addr(11)), amt(30));
    }

    proptest! {
        // per-delegate aggregates always sum to the voters' weights
        #[test]
        fn prop_aggregates_match_voter_weights(
            votes in proptest::collection::vec((0u8..6, 0u8..3, 0u64..1000), 1..50)
        ) {
            let mut store = DelegationStore::new();
            for (voter, candidate, weight) in votes {
                store.vote(addr(voter), addr(100 + candidate), amt(weight), 0);
            }

            let voted: u64 = (0u8..6)
                .filter_map(|v| store.voter(&addr(v)))
                .map(|voter| voter.votes.to_u64().unwrap())
                .sum();
            let aggregated: u64 = (0u8..3)
                .map(|c| store.votes_of(&addr(100 + c)).to_u64().unwrap())
                .sum();
            prop_assert_eq!(aggregated, voted);
        }
    }
}
