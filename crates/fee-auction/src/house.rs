// fee-auction/src/house.rs

use crate::{AuctionError, AuctionResult};
use exchange_core::{apply_rate_floor, precision, Amount, Timestamp, TokenId};
use exchange_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Auction engine parameters. Rates are PRECISION-scaled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Token bids are denominated in
    pub bid_token: TokenId,
    /// Seconds from launch to the earliest close
    pub auction_duration: u64,
    /// Smallest acceptable opening bid
    pub min_bid: Amount,
    /// Cut of every fee receipt routed to the dev balance
    pub dev_fee: Amount,
    /// Fee charged to an outbid bidder, deducted from their refund
    pub bid_fee: Amount,
    /// A bid landing closer than this to the close extends the auction
    pub extension_trigger: u64,
    /// Seconds added per late bid
    pub extension_duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    Active,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub token: TokenId,
    pub amount: Amount,
    pub current_bidder: Address,
    pub current_bid: Amount,
    pub end_time: Timestamp,
    pub status: AuctionStatus,
}

/// A transfer the caller must carry out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub token: TokenId,
    pub to: Address,
    pub amount: Amount,
}

/// Fee balances and running auctions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionHouse {
    pub config: AuctionConfig,
    admin: Address,
    pending_admin: Option<Address>,
    /// Tokens that can never be auctioned off
    whitelist: HashSet<TokenId>,
    /// Per-token balance available for auctioning
    public_balances: HashMap<TokenId, Amount>,
    /// Per-token dev cut, withdrawable by the admin
    dev_balances: HashMap<TokenId, Amount>,
    /// Accrued outbid fees in the bid token, PRECISION-scaled
    bid_fee_balance_f: Amount,
    auctions: HashMap<u64, Auction>,
    auctions_count: u64,
}

impl AuctionHouse {
    pub fn new(admin: Address, config: AuctionConfig) -> Self {
        let mut whitelist = HashSet::new();
        // the bid token itself is never up for auction
        whitelist.insert(config.bid_token.clone());
        Self {
            config,
            admin,
            pending_admin: None,
            whitelist,
            public_balances: HashMap::new(),
            dev_balances: HashMap::new(),
            bid_fee_balance_f: Amount::zero(),
            auctions: HashMap::new(),
            auctions_count: 0,
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn auction(&self, id: u64) -> Option<&Auction> {
        self.auctions.get(&id)
    }

    pub fn public_balance(&self, token: &TokenId) -> Amount {
        self.public_balances
            .get(token)
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn dev_balance(&self, token: &TokenId) -> Amount {
        self.dev_balances
            .get(token)
            .cloned()
            .unwrap_or_else(Amount::zero)
    }

    pub fn bid_fee_balance_f(&self) -> &Amount {
        &self.bid_fee_balance_f
    }

    pub fn is_whitelisted(&self, token: &TokenId) -> bool {
        self.whitelist.contains(token)
    }

    /// Book an incoming fee payment, skimming the dev cut
    pub fn receive_fee(&mut self, token: TokenId, amount: Amount) -> AuctionResult<()> {
        let dev_cut = apply_rate_floor(&amount, &self.config.dev_fee)?;
        let public_part = amount.saturating_sub(&dev_cut);

        let dev = self.dev_balance(&token) + dev_cut;
        self.dev_balances.insert(token.clone(), dev);
        let public = self.public_balance(&token) + public_part;
        self.public_balances.insert(token.clone(), public);

        debug!(%token, %amount, "fee received");
        Ok(())
    }

    /// Put a token's public fee balance up for auction.
    ///
    /// The caller has already locked `opening_bid` of the bid token.
    pub fn launch_auction(
        &mut self,
        sender: Address,
        token: TokenId,
        amount: Amount,
        opening_bid: Amount,
        now: Timestamp,
    ) -> AuctionResult<u64> {
        if self.whitelist.contains(&token) {
            return Err(AuctionError::TokenWhitelisted);
        }
        if amount.is_zero() {
            return Err(AuctionError::ZeroAmount);
        }
        let available = self.public_balance(&token);
        if amount > available {
            return Err(AuctionError::InsufficientBalance);
        }
        if opening_bid < self.config.min_bid {
            return Err(AuctionError::BidTooLow {
                minimum: self.config.min_bid.to_string(),
            });
        }

        self.public_balances
            .insert(token.clone(), available - amount.clone());

        let id = self.auctions_count;
        self.auctions_count += 1;
        self.auctions.insert(
            id,
            Auction {
                token: token.clone(),
                amount,
                current_bidder: sender,
                current_bid: opening_bid,
                end_time: now + self.config.auction_duration,
                status: AuctionStatus::Active,
            },
        );

        info!(id, %token, "auction launched");
        Ok(id)
    }

    /// Outbid the current leader.
    ///
    /// The caller has already locked `bid`; returns the refund owed to
    /// the outbid leader, net of the bid fee.
    pub fn place_bid(
        &mut self,
        sender: Address,
        id: u64,
        bid: Amount,
        now: Timestamp,
    ) -> AuctionResult<Payment> {
        let trigger = self.config.extension_trigger;
        let extension = self.config.extension_duration;
        let bid_fee = self.config.bid_fee.clone();
        let bid_token = self.config.bid_token.clone();

        let auction = self
            .auctions
            .get_mut(&id)
            .ok_or(AuctionError::AuctionNotFound(id))?;
        if auction.status == AuctionStatus::Finished || now >= auction.end_time {
            return Err(AuctionError::AuctionFinished);
        }
        if bid <= auction.current_bid {
            return Err(AuctionError::BidTooLow {
                minimum: auction.current_bid.to_string(),
            });
        }

        // fee accrues at full precision; the refund loses the rounded-up part
        let fee_f = auction.current_bid.clone() * bid_fee;
        let fee = exchange_core::mul_div_ceil(&fee_f, &Amount::from_u64(1), &precision())?;
        let refund = Payment {
            token: bid_token,
            to: auction.current_bidder,
            amount: auction.current_bid.saturating_sub(&fee),
        };
        self.bid_fee_balance_f = self.bid_fee_balance_f.clone() + fee_f;

        auction.current_bidder = sender;
        auction.current_bid = bid;
        if auction.end_time - now < trigger {
            auction.end_time += extension;
        }

        debug!(id, bidder = %sender, "bid placed");
        Ok(refund)
    }

    /// Close a finished auction: the lot goes to the winner, the
    /// winning bid is burned. Idempotence is rejected loudly.
    pub fn claim(&mut self, id: u64, now: Timestamp) -> AuctionResult<Vec<Payment>> {
        let bid_token = self.config.bid_token.clone();
        let auction = self
            .auctions
            .get_mut(&id)
            .ok_or(AuctionError::AuctionNotFound(id))?;
        if auction.status == AuctionStatus::Finished {
            return Err(AuctionError::AuctionFinished);
        }
        if now < auction.end_time {
            return Err(AuctionError::AuctionNotFinished);
        }

        auction.status = AuctionStatus::Finished;
        info!(id, winner = %auction.current_bidder, "auction claimed");
        Ok(vec![
            Payment {
                token: auction.token.clone(),
                to: auction.current_bidder,
                amount: auction.amount.clone(),
            },
            Payment {
                token: bid_token,
                to: Address::zero(),
                amount: auction.current_bid.clone(),
            },
        ])
    }

    /// Pay out a token's dev balance (admin only)
    pub fn withdraw_dev_fee(
        &mut self,
        sender: Address,
        token: TokenId,
        receiver: Address,
    ) -> AuctionResult<Payment> {
        self.require_admin(sender)?;
        let amount = self.dev_balance(&token);
        self.dev_balances.insert(token.clone(), Amount::zero());
        Ok(Payment {
            token,
            to: receiver,
            amount,
        })
    }

    /// Burn the whole-unit part of the accrued bid fees (admin only),
    /// carrying the fractional remainder
    pub fn burn_bid_fee(&mut self, sender: Address) -> AuctionResult<Payment> {
        self.require_admin(sender)?;
        let p = precision();
        let burn = Amount::new(self.bid_fee_balance_f.inner() / p.inner());
        self.bid_fee_balance_f = self
            .bid_fee_balance_f
            .saturating_sub(&(burn.clone() * p));
        Ok(Payment {
            token: self.config.bid_token.clone(),
            to: Address::zero(),
            amount: burn,
        })
    }

    pub fn set_admin(&mut self, sender: Address, new_admin: Address) -> AuctionResult<()> {
        self.require_admin(sender)?;
        self.pending_admin = Some(new_admin);
        Ok(())
    }

    pub fn confirm_admin(&mut self, sender: Address) -> AuctionResult<()> {
        if self.pending_admin != Some(sender) {
            return Err(AuctionError::AccessDenied);
        }
        self.admin = sender;
        self.pending_admin = None;
        Ok(())
    }

    pub fn set_min_bid(&mut self, sender: Address, min_bid: Amount) -> AuctionResult<()> {
        self.require_admin(sender)?;
        self.config.min_bid = min_bid;
        Ok(())
    }

    pub fn set_auction_duration(&mut self, sender: Address, duration: u64) -> AuctionResult<()> {
        self.require_admin(sender)?;
        self.config.auction_duration = duration;
        Ok(())
    }

    pub fn set_fees(&mut self, sender: Address, dev_fee: Amount, bid_fee: Amount) -> AuctionResult<()> {
        self.require_admin(sender)?;
        self.config.dev_fee = dev_fee;
        self.config.bid_fee = bid_fee;
        Ok(())
    }

    /// Add or remove a token from the never-auctioned list (admin only)
    pub fn set_whitelist(&mut self, sender: Address, token: TokenId, listed: bool) -> AuctionResult<()> {
        self.require_admin(sender)?;
        if listed {
            self.whitelist.insert(token);
        } else {
            self.whitelist.remove(&token);
        }
        Ok(())
    }

    fn require_admin(&self, sender: Address) -> AuctionResult<()> {
        if sender != self.admin {
            return Err(AuctionError::AccessDenied);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn amt(v: u64) -> Amount {
        Amount::from_u64(v)
    }

    // rate of n/1000, PRECISION-scaled
    fn permille(n: u64) -> Amount {
        Amount::new(BigUint::from(n) * BigUint::from(10u64).pow(15))
    }

    fn token(byte: u8) -> TokenId {
        TokenId::Single(addr(byte))
    }

    fn house() -> AuctionHouse {
        AuctionHouse::new(
            addr(1),
            AuctionConfig {
                bid_token: token(100),
                auction_duration: 1000,
                min_bid: amt(10),
                dev_fee: permille(100), // 10%
                bid_fee: permille(100), // 10%
                extension_trigger: 60,
                extension_duration: 120,
            },
        )
    }

    #[test]
    fn test_receive_fee_splits_dev_cut() {
        let mut h = house();
        h.receive_fee(token(2), amt(1000)).unwrap();

        assert_eq!(h.dev_balance(&token(2)), amt(100));
        assert_eq!(h.public_balance(&token(2)), amt(900));

        // dev cut rounds down, the public side keeps the remainder
        h.receive_fee(token(2), amt(15)).unwrap();
        assert_eq!(h.dev_balance(&token(2)), amt(101));
        assert_eq!(h.public_balance(&token(2)), amt(914));
    }

    #[test]
    fn test_launch_requires_balance_and_min_bid() {
        let mut h = house();
        h.receive_fee(token(2), amt(1000)).unwrap();

        assert!(matches!(
            h.launch_auction(addr(5), token(2), amt(901), amt(10), 0),
            Err(AuctionError::InsufficientBalance)
        ));
        assert!(matches!(
            h.launch_auction(addr(5), token(2), Amount::zero(), amt(10), 0),
            Err(AuctionError::ZeroAmount)
        ));
        assert!(matches!(
            h.launch_auction(addr(5), token(2), amt(100), amt(9), 0),
            Err(AuctionError::BidTooLow { .. })
        ));
        // the bid token can never be the lot
        assert!(matches!(
            h.launch_auction(addr(5), token(100), amt(1), amt(10), 0),
            Err(AuctionError::TokenWhitelisted)
        ));

        let id = h
            .launch_auction(addr(5), token(2), amt(900), amt(10), 0)
            .unwrap();
        assert_eq!(h.public_balance(&token(2)), Amount::zero());
        let auction = h.auction(id).unwrap();
        assert_eq!(auction.end_time, 1000);
        assert_eq!(auction.current_bid, amt(10));
        assert_eq!(auction.current_bidder, addr(5));
    }

    #[test]
    fn test_outbid_refunds_minus_fee() {
        let mut h = house();
        h.receive_fee(token(2), amt(1000)).unwrap();
        let id = h
            .launch_auction(addr(5), token(2), amt(900), amt(100), 0)
            .unwrap();

        // fee on the 100 bid is exactly 10
        let refund = h.place_bid(addr(6), id, amt(150), 100).unwrap();
        assert_eq!(refund.to, addr(5));
        assert_eq!(refund.amount, amt(90));
        assert_eq!(refund.token, token(100));

        // fee on 150 is 15; a fractional fee rounds against the refund
        let refund = h.place_bid(addr(7), id, amt(151), 200).unwrap();
        assert_eq!(refund.amount, amt(135));
        let refund = h.place_bid(addr(6), id, amt(200), 300).unwrap();
        // 10% of 151 is 15.1, refund loses 16
        assert_eq!(refund.amount, amt(135));
    }

    #[test]
    fn test_bid_fee_burn_carries_remainder() {
        let mut h = house();
        h.receive_fee(token(2), amt(1000)).unwrap();
        let id = h
            .launch_auction(addr(5), token(2), amt(900), amt(100), 0)
            .unwrap();
        h.place_bid(addr(6), id, amt(151), 100).unwrap();
        h.place_bid(addr(7), id, amt(200), 200).unwrap();

        // accrued fees: 10.0 + 15.1 = 25.1
        let burn = h.burn_bid_fee(addr(1)).unwrap();
        assert_eq!(burn.amount, amt(25));
        assert_eq!(burn.to, Address::zero());
        // 0.1 stays behind at full precision
        assert_eq!(h.bid_fee_balance_f(), &(amt(1) * permille(100)));
    }

    #[test]
    fn test_late_bid_extends_auction() {
        let mut h = house();
        h.receive_fee(token(2), amt(1000)).unwrap();
        let id = h
            .launch_auction(addr(5), token(2), amt(900), amt(100), 0)
            .unwrap();

        // 30s before the close, inside the 60s trigger window
        h.place_bid(addr(6), id, amt(150), 970).unwrap();
        assert_eq!(h.auction(id).unwrap().end_time, 1120);

        // past the (extended) close, bids are rejected
        assert!(matches!(
            h.place_bid(addr(7), id, amt(200), 1120),
            Err(AuctionError::AuctionFinished)
        ));
    }

    #[test]
    fn test_claim_lifecycle() {
        let mut h = house();
        h.receive_fee(token(2), amt(1000)).unwrap();
        let id = h
            .launch_auction(addr(5), token(2), amt(900), amt(100), 0)
            .unwrap();
        h.place_bid(addr(6), id, amt(150), 100).unwrap();

        assert!(matches!(
            h.claim(id, 999),
            Err(AuctionError::AuctionNotFinished)
        ));

        let payments = h.claim(id, 1000).unwrap();
        assert_eq!(payments.len(), 2);
        // the lot to the winner
        assert_eq!(payments[0], Payment { token: token(2), to: addr(6), amount: amt(900) });
        // the winning bid burned
        assert_eq!(payments[1], Payment { token: token(100), to: Address::zero(), amount: amt(150) });

        assert!(matches!(h.claim(id, 1001), Err(AuctionError::AuctionFinished)));
    }

    #[test]
    fn test_admin_rotation_and_guards() {
        let mut h = house();
        assert!(matches!(
            h.set_min_bid(addr(9), amt(5)),
            Err(AuctionError::AccessDenied)
        ));
        assert!(matches!(
            h.withdraw_dev_fee(addr(9), token(2), addr(9)),
            Err(AuctionError::AccessDenied)
        ));

        h.set_admin(addr(1), addr(2)).unwrap();
        // rotation is two-step; the old admin still holds power
        h.set_min_bid(addr(1), amt(5)).unwrap();
        assert!(matches!(h.confirm_admin(addr(3)), Err(AuctionError::AccessDenied)));
        h.confirm_admin(addr(2)).unwrap();
        assert_eq!(h.admin(), addr(2));

        h.receive_fee(token(2), amt(1000)).unwrap();
        let payout = h.withdraw_dev_fee(addr(2), token(2), addr(4)).unwrap();
        assert_eq!(payout.amount, amt(100));
        assert_eq!(h.dev_balance(&token(2)), Amount::zero());
    }
}
