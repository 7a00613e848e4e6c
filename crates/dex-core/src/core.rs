// dex-core/src/core.rs

use crate::config::ExchangeConfig;
use crate::fees::FeeBalances;
use crate::flash::{required_repayment, FlashSwapRule, PendingFlashSwap};
use crate::ledger::{BalanceRequest, OperatorUpdate, ShareLedger, TransferItem};
use crate::oracle::update_cumulative_prices;
use crate::pair::{Pair, Side};
use crate::permit::PermitStore;
use crate::swap::{calculate_swap, SwapParams};
use crate::{DexCoreError, DexCoreResult, Fees};
use delegation::{DelegateRegistry, DelegationStore, RewardState, VoterRewards};
use exchange_core::{apply_rate_floor, mul_div_ceil, mul_div_floor, Amount, BlockNumber, PairId, Timestamp, TokenId};
use exchange_crypto::{Address, Hash, Hashable, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Ambient facts about the call, supplied by the substrate
#[derive(Debug, Clone)]
pub struct CallContext {
    pub sender: Address,
    /// Native value attached to the call
    pub payment: Amount,
    pub now: Timestamp,
    pub level: BlockNumber,
}

impl CallContext {
    pub fn new(sender: Address, now: Timestamp, level: BlockNumber) -> Self {
        Self {
            sender,
            payment: Amount::zero(),
            now,
            level,
        }
    }

    pub fn with_payment(mut self, payment: Amount) -> Self {
        self.payment = payment;
        self
    }
}

/// A later atomic step of the current call chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Continuation {
    /// The borrower must repay `required` of `token`, then the
    /// substrate invokes `flash_swap_callback`
    FlashSwapCallback { token: TokenId, required: Amount },
    /// Hand fees over to the auction engine
    ReceiveFee { token: TokenId, amount: Amount },
    /// Pay out settled delegation rewards in native coin
    PourOut { receiver: Address, amount: Amount },
    /// Terminal step: clear the re-entrancy guard
    Close,
}

/// What the substrate must carry out after an entrypoint returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Transfer {
        token: TokenId,
        to: Address,
        amount: Amount,
    },
    Delegation {
        pair_id: PairId,
        delegate: Address,
    },
    Continuation(Continuation),
}

/// The exchange state machine. Every entrypoint checks the
/// re-entrancy guard, validates the attached native payment, mutates
/// state, and returns the effects to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexCore {
    self_address: Address,
    admin: Address,
    pending_admin: Option<Address>,
    managers: HashSet<Address>,
    config: ExchangeConfig,

    pairs: HashMap<PairId, Pair>,
    pair_ids: HashMap<(TokenId, TokenId), PairId>,
    pairs_count: u64,

    ledger: ShareLedger,
    fee_balances: FeeBalances,
    permits: PermitStore,

    delegation: HashMap<PairId, DelegationStore>,
    delegate_registry: DelegateRegistry,
    rewards: HashMap<PairId, RewardState>,
    voter_rewards: HashMap<(PairId, Address), VoterRewards>,

    pending_flash: Option<PendingFlashSwap>,
    entered: bool,
}

impl DexCore {
    pub fn new(self_address: Address, admin: Address, config: ExchangeConfig) -> DexCoreResult<Self> {
        config.fees.validate()?;
        Ok(Self {
            self_address,
            admin,
            pending_admin: None,
            managers: HashSet::new(),
            permits: PermitStore::new(config.default_expiry, config.max_expiry),
            config,
            pairs: HashMap::new(),
            pair_ids: HashMap::new(),
            pairs_count: 0,
            ledger: ShareLedger::new(),
            fee_balances: FeeBalances::new(),
            delegation: HashMap::new(),
            delegate_registry: DelegateRegistry::new(),
            rewards: HashMap::new(),
            voter_rewards: HashMap::new(),
            pending_flash: None,
            entered: false,
        })
    }

    // --- views ---

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn pair(&self, pair_id: PairId) -> DexCoreResult<&Pair> {
        self.pairs
            .get(&pair_id)
            .ok_or(DexCoreError::PairNotListed(pair_id))
    }

    pub fn pair_id(&self, token_a: &TokenId, token_b: &TokenId) -> Option<PairId> {
        self.pair_ids
            .get(&(token_a.clone(), token_b.clone()))
            .copied()
    }

    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    pub fn fee_balances(&self) -> &FeeBalances {
        &self.fee_balances
    }

    pub fn permits(&self) -> &PermitStore {
        &self.permits
    }

    pub fn delegation_store(&self, pair_id: PairId) -> Option<&DelegationStore> {
        self.delegation.get(&pair_id)
    }

    pub fn delegate_registry(&self) -> &DelegateRegistry {
        &self.delegate_registry
    }

    pub fn reward_state(&self, pair_id: PairId) -> Option<&RewardState> {
        self.rewards.get(&pair_id)
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    pub fn balance_of(&self, requests: &[BalanceRequest]) -> Vec<(BalanceRequest, Amount)> {
        requests
            .iter()
            .map(|request| {
                let balance = self.ledger.balance_of(&request.owner, request.pair_id);
                (request.clone(), balance)
            })
            .collect()
    }

    // --- liquidity ---

    /// Register a pair, or re-seed a drained one, and mint the
    /// bootstrap shares to `shares_receiver`
    pub fn launch_pair(
        &mut self,
        ctx: &CallContext,
        token_a: TokenId,
        token_b: TokenId,
        amount_a: Amount,
        amount_b: Amount,
        shares_receiver: Address,
        candidate: Option<Address>,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        if token_a >= token_b {
            return Err(DexCoreError::WrongTokenOrder);
        }
        if amount_a.is_zero() || amount_b.is_zero() {
            return Err(DexCoreError::ZeroAmount);
        }
        self.check_native_payment(ctx, &token_a, &amount_a)?;

        let pair_id = match self.pair_ids.get(&(token_a.clone(), token_b.clone())) {
            Some(&id) => {
                if !self.pairs[&id].is_drained() {
                    return Err(DexCoreError::PairAlreadyListed);
                }
                id
            }
            None => {
                let id = self.pairs_count;
                self.pairs_count += 1;
                self.pair_ids.insert((token_a.clone(), token_b.clone()), id);
                self.pairs
                    .insert(id, Pair::new(token_a.clone(), token_b.clone(), ctx.now));
                if token_a.is_native() {
                    self.delegation.insert(id, DelegationStore::new());
                    self.rewards.insert(id, RewardState::new());
                }
                id
            }
        };

        let shares = amount_a.clone().min(amount_b.clone());
        {
            let pair = self.pairs.get_mut(&pair_id).ok_or(DexCoreError::PairNotListed(pair_id))?;
            update_cumulative_prices(pair, ctx.now)?;
            pair.reserve_a = pair.reserve_a.clone() + amount_a;
            pair.reserve_b = pair.reserve_b.clone() + amount_b;
            pair.total_shares = shares.clone();
        }

        self.settle_holder_rewards(pair_id, &shares_receiver, &shares, ctx.level)?;
        self.ledger.credit(shares_receiver, pair_id, shares);

        info!(pair_id, %token_a, %token_b, "pair launched");

        let mut effects = Vec::new();
        if let Some(effect) = self.refresh_vote(pair_id, &shares_receiver, candidate, ctx.now)? {
            effects.push(effect);
        }
        Ok(effects)
    }

    /// Mint `shares` to `shares_receiver` against proportional deposits
    /// of both legs, paid by the caller
    pub fn invest(
        &mut self,
        ctx: &CallContext,
        pair_id: PairId,
        shares: Amount,
        shares_receiver: Address,
        max_a: Amount,
        max_b: Amount,
        candidate: Option<Address>,
        deadline: Timestamp,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_deadline(ctx, deadline)?;
        if shares.is_zero() {
            return Err(DexCoreError::ZeroAmount);
        }

        let (required_a, required_b, native_leg) = {
            let pair = self.pair(pair_id)?;
            if pair.is_drained() {
                return Err(DexCoreError::InsufficientLiquidity);
            }
            let required_a = mul_div_ceil(&shares, &pair.reserve_a, &pair.total_shares)?;
            let required_b = mul_div_ceil(&shares, &pair.reserve_b, &pair.total_shares)?;
            (required_a, required_b, pair.has_native_leg())
        };
        if required_a > max_a || required_b > max_b {
            return Err(DexCoreError::SlippageExceeded);
        }

        let mut effects = Vec::new();
        if native_leg {
            // the whole declared native amount arrives; the unused
            // part goes straight back
            if ctx.payment != max_a {
                return Err(DexCoreError::UnexpectedNativePayment);
            }
            let refund = max_a.saturating_sub(&required_a);
            if !refund.is_zero() {
                effects.push(Effect::Transfer {
                    token: TokenId::Native,
                    to: ctx.sender,
                    amount: refund,
                });
            }
        } else if !ctx.payment.is_zero() {
            return Err(DexCoreError::UnexpectedNativePayment);
        }

        let balance_after = self.ledger.balance_of(&shares_receiver, pair_id) + shares.clone();
        self.settle_holder_rewards(pair_id, &shares_receiver, &balance_after, ctx.level)?;

        {
            let pair = self.pairs.get_mut(&pair_id).ok_or(DexCoreError::PairNotListed(pair_id))?;
            update_cumulative_prices(pair, ctx.now)?;
            pair.reserve_a = pair.reserve_a.clone() + required_a;
            pair.reserve_b = pair.reserve_b.clone() + required_b;
            pair.total_shares = pair.total_shares.clone() + shares.clone();
        }
        self.ledger.credit(shares_receiver, pair_id, shares);

        if let Some(effect) = self.refresh_vote(pair_id, &shares_receiver, candidate, ctx.now)? {
            effects.push(effect);
        }
        Ok(effects)
    }

    /// Burn `shares` and pay out the proportional part of both reserves
    pub fn divest(
        &mut self,
        ctx: &CallContext,
        pair_id: PairId,
        shares: Amount,
        min_a: Amount,
        min_b: Amount,
        receiver: Address,
        deadline: Timestamp,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.check_deadline(ctx, deadline)?;
        if shares.is_zero() {
            return Err(DexCoreError::ZeroAmount);
        }
        if self.ledger.balance_of(&ctx.sender, pair_id) < shares {
            return Err(DexCoreError::InsufficientBalance);
        }

        let (out_a, out_b, token_a, token_b) = {
            let pair = self.pair(pair_id)?;
            let out_a = mul_div_floor(&shares, &pair.reserve_a, &pair.total_shares)?;
            let out_b = mul_div_floor(&shares, &pair.reserve_b, &pair.total_shares)?;
            (out_a, out_b, pair.token_a.clone(), pair.token_b.clone())
        };
        if out_a.is_zero() || out_b.is_zero() {
            return Err(DexCoreError::InsufficientLiquidity);
        }
        if out_a < min_a || out_b < min_b {
            return Err(DexCoreError::SlippageExceeded);
        }

        let balance_after = self
            .ledger
            .balance_of(&ctx.sender, pair_id)
            .saturating_sub(&shares);
        self.settle_holder_rewards(pair_id, &ctx.sender, &balance_after, ctx.level)?;

        {
            let pair = self.pairs.get_mut(&pair_id).ok_or(DexCoreError::PairNotListed(pair_id))?;
            update_cumulative_prices(pair, ctx.now)?;
            pair.reserve_a = pair.reserve_a.saturating_sub(&out_a);
            pair.reserve_b = pair.reserve_b.saturating_sub(&out_b);
            pair.total_shares = pair.total_shares.saturating_sub(&shares);
        }
        self.ledger.debit(&ctx.sender, pair_id, &shares)?;

        let mut effects = vec![
            Effect::Transfer {
                token: token_a,
                to: receiver,
                amount: out_a,
            },
            Effect::Transfer {
                token: token_b,
                to: receiver,
                amount: out_b,
            },
        ];
        if let Some(effect) = self.refresh_vote(pair_id, &ctx.sender, None, ctx.now)? {
            effects.push(effect);
        }
        Ok(effects)
    }

    // --- swaps ---

    /// Execute a routed swap and pay the final output to the receiver
    pub fn swap(&mut self, ctx: &CallContext, params: SwapParams) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_deadline(ctx, params.deadline)?;
        if params.legs.is_empty() {
            return Err(DexCoreError::RouteMalformed("empty route".into()));
        }
        if params.amount_in.is_zero() {
            return Err(DexCoreError::ZeroAmount);
        }
        if params.referrer == params.receiver {
            return Err(DexCoreError::SelfReferral);
        }

        let first_input = {
            let pair = self.pair(params.legs[0].pair_id)?;
            pair.token(params.legs[0].direction.input_side()).clone()
        };
        self.check_native_payment(ctx, &first_input, &params.amount_in)?;

        let fees = self.config.fees.clone();
        let mut current_token = first_input;
        let mut amount = params.amount_in.clone();

        for leg in &params.legs {
            let pair = self
                .pairs
                .get_mut(&leg.pair_id)
                .ok_or(DexCoreError::PairNotListed(leg.pair_id))?;
            if pair.is_drained() {
                return Err(DexCoreError::InsufficientLiquidity);
            }

            let input_side = leg.direction.input_side();
            let input_token = pair.token(input_side).clone();
            if input_token != current_token {
                return Err(DexCoreError::RouteMalformed(
                    "leg input does not match the routed token".into(),
                ));
            }

            update_cumulative_prices(pair, ctx.now)?;
            let result = calculate_swap(
                &amount,
                pair.reserve(input_side),
                pair.reserve(input_side.opposite()),
                &fees,
            )?;

            let input_reserve = pair.reserve(input_side).clone() + result.pool_in.clone();
            *pair.reserve_mut(input_side) = input_reserve;
            let output_reserve = pair
                .reserve(input_side.opposite())
                .checked_sub(&result.amount_out)
                .ok_or(DexCoreError::InsufficientLiquidity)?;
            *pair.reserve_mut(input_side.opposite()) = output_reserve;

            let output_token = pair.token(input_side.opposite()).clone();
            debug!(
                pair_id = leg.pair_id,
                amount_in = %amount,
                amount_out = %result.amount_out,
                "swap leg executed"
            );

            self.fee_balances.accrue_interface(
                &current_token,
                &params.referrer,
                result.interface_fee_amt.clone(),
            );
            self.fee_balances
                .accrue_protocol(&current_token, result.protocol_fee_amt.clone());

            current_token = output_token;
            amount = result.amount_out;
        }

        if amount < params.min_amount_out {
            return Err(DexCoreError::SlippageExceeded);
        }

        Ok(vec![Effect::Transfer {
            token: current_token,
            to: params.receiver,
            amount,
        }])
    }

    // --- flash swaps ---

    /// Lend one side of a pair; repayment happens in the callback step
    #[allow(clippy::too_many_arguments)]
    pub fn flash_swap(
        &mut self,
        ctx: &CallContext,
        pair_id: PairId,
        rule: FlashSwapRule,
        lent_side: Side,
        receiver: Address,
        referrer: Address,
        amount_out: Amount,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        if amount_out.is_zero() {
            return Err(DexCoreError::ZeroAmount);
        }
        if referrer == receiver {
            return Err(DexCoreError::SelfReferral);
        }

        let fees = self.config.fees.clone();
        let (lent_token, repay_token, required) = {
            let pair = self
                .pairs
                .get_mut(&pair_id)
                .ok_or(DexCoreError::PairNotListed(pair_id))?;
            if pair.is_drained() || amount_out >= *pair.reserve(lent_side) {
                return Err(DexCoreError::InsufficientLiquidity);
            }
            update_cumulative_prices(pair, ctx.now)?;

            let required = required_repayment(rule, pair, lent_side, &amount_out, &fees)?;
            let reduced = pair.reserve(lent_side).saturating_sub(&amount_out);
            *pair.reserve_mut(lent_side) = reduced;

            let lent_token = pair.token(lent_side).clone();
            let repay_token = pair.token(rule.repay_side(lent_side)).clone();
            (lent_token, repay_token, required)
        };

        self.entered = true;
        self.pending_flash = Some(PendingFlashSwap {
            pair_id,
            rule,
            lent_side,
            repay_side: rule.repay_side(lent_side),
            amount_out: amount_out.clone(),
            required: required.clone(),
            referrer,
        });

        info!(pair_id, %amount_out, %required, "flash swap opened");
        Ok(vec![
            Effect::Transfer {
                token: lent_token,
                to: receiver,
                amount: amount_out,
            },
            Effect::Continuation(Continuation::FlashSwapCallback {
                token: repay_token,
                required,
            }),
        ])
    }

    /// Second step of a flash-swap chain: verify and book the repayment
    pub fn flash_swap_callback(
        &mut self,
        ctx: &CallContext,
        repaid: Amount,
    ) -> DexCoreResult<Vec<Effect>> {
        if !self.entered {
            return Err(DexCoreError::NotEntered);
        }
        // validate before consuming the pending state, so a rejected
        // repayment leaves the chain open for a retry
        let (pair_id, repay_side, referrer, required) = {
            let pending = self
                .pending_flash
                .as_ref()
                .ok_or(DexCoreError::NoPendingFlashSwap)?;
            (
                pending.pair_id,
                pending.repay_side,
                pending.referrer,
                pending.required.clone(),
            )
        };
        let repay_token = {
            let pair = self.pair(pair_id)?;
            pair.token(repay_side).clone()
        };
        self.check_native_payment(ctx, &repay_token, &repaid)?;
        if repaid < required {
            return Err(DexCoreError::InsufficientBalance);
        }
        self.pending_flash = None;

        let fees = self.config.fees.clone();
        let interface_fee_amt = apply_rate_floor(&repaid, &fees.interface_fee)?;
        let out_of_pool = fees.interface_fee.clone() + fees.protocol_fee.clone();
        let pool_in =
            apply_rate_floor(&repaid, &exchange_core::precision().saturating_sub(&out_of_pool))?;
        let protocol_fee_amt = repaid
            .saturating_sub(&pool_in)
            .saturating_sub(&interface_fee_amt);

        {
            let pair = self
                .pairs
                .get_mut(&pair_id)
                .ok_or(DexCoreError::PairNotListed(pair_id))?;
            let repaid_reserve = pair.reserve(repay_side).clone() + pool_in;
            *pair.reserve_mut(repay_side) = repaid_reserve;
        }
        self.fee_balances
            .accrue_interface(&repay_token, &referrer, interface_fee_amt);
        self.fee_balances
            .accrue_protocol(&repay_token, protocol_fee_amt);

        debug!(pair_id, %repaid, "flash swap repaid");
        Ok(vec![Effect::Continuation(Continuation::Close)])
    }

    /// Terminal step of a continuation chain, sent by the exchange to
    /// itself
    pub fn close(&mut self, ctx: &CallContext) -> DexCoreResult<Vec<Effect>> {
        if ctx.sender != self.self_address {
            return Err(DexCoreError::AccessDenied);
        }
        if !self.entered {
            return Err(DexCoreError::NotEntered);
        }
        self.entered = false;
        Ok(Vec::new())
    }

    // --- share-token surface ---

    /// Batched share transfer; unauthorized spenders fall back to a
    /// permit matching the batch parameters
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        batch: Vec<TransferItem>,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;

        let param_hash = bincode::serialize(&batch)?.hash();

        // dry-run the whole batch against a scratch view first; the
        // ledger is only touched once every move is known to go through
        let mut scratch: HashMap<(Address, PairId), Amount> = HashMap::new();
        let mut permit_needed: HashSet<Address> = HashSet::new();
        for item in &batch {
            for dest in &item.destinations {
                let authorized = item.from == ctx.sender
                    || self
                        .ledger
                        .is_operator(&item.from, &ctx.sender, dest.pair_id);
                if !authorized && !permit_needed.contains(&item.from) {
                    self.permits.check(&item.from, &param_hash, ctx.now)?;
                    permit_needed.insert(item.from);
                }

                let from_key = (item.from, dest.pair_id);
                let available = match scratch.get(&from_key) {
                    Some(balance) => balance.clone(),
                    None => self.ledger.balance_of(&item.from, dest.pair_id),
                };
                if available < dest.amount {
                    return Err(DexCoreError::InsufficientBalance);
                }
                scratch.insert(from_key, available.saturating_sub(&dest.amount));

                let to_key = (dest.to, dest.pair_id);
                let received = match scratch.get(&to_key) {
                    Some(balance) => balance.clone(),
                    None => self.ledger.balance_of(&dest.to, dest.pair_id),
                };
                scratch.insert(to_key, received + dest.amount.clone());
            }
        }
        for issuer in &permit_needed {
            self.permits.consume(issuer, &param_hash, ctx.now)?;
        }

        let mut effects = Vec::new();
        for item in &batch {
            for dest in &item.destinations {
                if item.from == dest.to {
                    continue;
                }

                let from_after = self
                    .ledger
                    .balance_of(&item.from, dest.pair_id)
                    .saturating_sub(&dest.amount);
                let to_after =
                    self.ledger.balance_of(&dest.to, dest.pair_id) + dest.amount.clone();
                self.settle_holder_rewards(dest.pair_id, &item.from, &from_after, ctx.level)?;
                self.settle_holder_rewards(dest.pair_id, &dest.to, &to_after, ctx.level)?;

                self.ledger.debit(&item.from, dest.pair_id, &dest.amount)?;
                self.ledger.credit(dest.to, dest.pair_id, dest.amount.clone());

                if let Some(effect) = self.refresh_vote(dest.pair_id, &item.from, None, ctx.now)? {
                    effects.push(effect);
                }
                if let Some(effect) = self.refresh_vote(dest.pair_id, &dest.to, None, ctx.now)? {
                    effects.push(effect);
                }
            }
        }
        Ok(effects)
    }

    /// Per-pair operator approvals; only the owner may change their own
    pub fn update_operators(
        &mut self,
        ctx: &CallContext,
        updates: Vec<OperatorUpdate>,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        for update in &updates {
            if update.owner() != &ctx.sender {
                return Err(DexCoreError::AccessDenied);
            }
            self.ledger.update_operator(update);
        }
        Ok(Vec::new())
    }

    // --- permits ---

    pub fn permit(
        &mut self,
        ctx: &CallContext,
        public_key: &PublicKey,
        signature: &Signature,
        param_hash: Hash,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        let self_address = self.self_address;
        let issuer = self
            .permits
            .submit(&self_address, public_key, signature, param_hash, ctx.now)?;
        debug!(%issuer, %param_hash, "permit registered");
        Ok(Vec::new())
    }

    pub fn set_expiry(
        &mut self,
        ctx: &CallContext,
        expiry: u64,
        param_hash: Option<Hash>,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.permits.set_expiry(&ctx.sender, expiry, param_hash)?;
        Ok(Vec::new())
    }

    // --- fee settlement ---

    /// Pay out the caller's referral earnings in one token
    pub fn claim_interface_fee(
        &mut self,
        ctx: &CallContext,
        token: TokenId,
        receiver: Address,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        let amount = self.fee_balances.take_interface(&token, &ctx.sender);
        if amount.is_zero() {
            return Ok(Vec::new());
        }
        Ok(vec![Effect::Transfer {
            token,
            to: receiver,
            amount,
        }])
    }

    /// Ship the accumulated protocol fees in one token to the auction,
    /// paying the caller a cut for triggering it
    pub fn withdraw_protocol_fee(
        &mut self,
        ctx: &CallContext,
        token: TokenId,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        let balance = self.fee_balances.take_protocol(&token);
        if balance.is_zero() {
            return Ok(Vec::new());
        }
        let reward = apply_rate_floor(&balance, &self.config.fees.withdraw_fee_reward)?;
        let remainder = balance.saturating_sub(&reward);

        // the hand-over runs as a continuation chain, so the guard
        // stays up until the terminal close
        self.entered = true;
        let mut effects = Vec::new();
        if !reward.is_zero() {
            effects.push(Effect::Transfer {
                token: token.clone(),
                to: ctx.sender,
                amount: reward,
            });
        }
        effects.push(Effect::Continuation(Continuation::ReceiveFee {
            token,
            amount: remainder,
        }));
        effects.push(Effect::Continuation(Continuation::Close));
        Ok(effects)
    }

    // --- delegation ---

    /// Cast or refresh the caller's vote with their full share balance
    pub fn vote(
        &mut self,
        ctx: &CallContext,
        pair_id: PairId,
        candidate: Address,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.pair(pair_id)?;
        if !self.delegation.contains_key(&pair_id) {
            return Err(DexCoreError::NoNativeLeg);
        }
        let mut effects = Vec::new();
        if let Some(effect) = self.refresh_vote(pair_id, &ctx.sender, Some(candidate), ctx.now)? {
            effects.push(effect);
        }
        Ok(effects)
    }

    /// Ban or unban a delegate (admin or manager)
    pub fn ban(
        &mut self,
        ctx: &CallContext,
        pair_id: PairId,
        delegate: Address,
        period: u64,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        if ctx.sender != self.admin && !self.managers.contains(&ctx.sender) {
            return Err(DexCoreError::AccessDenied);
        }
        let store = self
            .delegation
            .get_mut(&pair_id)
            .ok_or(DexCoreError::NoNativeLeg)?;
        store.ban(delegate, period, ctx.now);
        Ok(Vec::new())
    }

    /// Bank a native reward deposit for a pair's next collecting period
    pub fn fill(&mut self, ctx: &CallContext, pair_id: PairId) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        if ctx.payment.is_zero() {
            return Err(DexCoreError::ZeroAmount);
        }
        let total = self.pair(pair_id)?.total_shares.clone();
        let collecting_period = self.config.collecting_period;
        let state = self
            .rewards
            .get_mut(&pair_id)
            .ok_or(DexCoreError::NoNativeLeg)?;
        state.update(&total, ctx.level, collecting_period)?;
        state.fill(ctx.payment.clone());
        Ok(Vec::new())
    }

    /// Settle and pay out the caller's delegation rewards for a pair
    pub fn withdraw_profit(
        &mut self,
        ctx: &CallContext,
        pair_id: PairId,
        receiver: Address,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.pair(pair_id)?;
        if !self.rewards.contains_key(&pair_id) {
            return Err(DexCoreError::NoNativeLeg);
        }

        let balance = self.ledger.balance_of(&ctx.sender, pair_id);
        self.settle_holder_rewards(pair_id, &ctx.sender, &balance, ctx.level)?;

        let state = self
            .rewards
            .get(&pair_id)
            .ok_or(DexCoreError::NoNativeLeg)?;
        let voter = self
            .voter_rewards
            .entry((pair_id, ctx.sender))
            .or_default();
        let amount = state.claim(voter)?;
        if amount.is_zero() {
            return Ok(Vec::new());
        }
        self.entered = true;
        Ok(vec![
            Effect::Continuation(Continuation::PourOut { receiver, amount }),
            Effect::Continuation(Continuation::Close),
        ])
    }

    // --- admin ---

    pub fn set_admin(&mut self, ctx: &CallContext, new_admin: Address) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.require_admin(ctx)?;
        self.pending_admin = Some(new_admin);
        Ok(Vec::new())
    }

    pub fn confirm_admin(&mut self, ctx: &CallContext) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        if self.pending_admin != Some(ctx.sender) {
            return Err(DexCoreError::AccessDenied);
        }
        self.admin = ctx.sender;
        self.pending_admin = None;
        info!(admin = %self.admin, "admin rotated");
        Ok(Vec::new())
    }

    pub fn add_managers(
        &mut self,
        ctx: &CallContext,
        updates: Vec<(Address, bool)>,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.require_admin(ctx)?;
        for (manager, add) in updates {
            if add {
                self.managers.insert(manager);
            } else {
                self.managers.remove(&manager);
            }
        }
        Ok(Vec::new())
    }

    pub fn set_fees(&mut self, ctx: &CallContext, fees: Fees) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.require_admin(ctx)?;
        fees.validate()?;
        self.config.fees = fees;
        Ok(Vec::new())
    }

    pub fn set_collecting_period(
        &mut self,
        ctx: &CallContext,
        collecting_period: u64,
    ) -> DexCoreResult<Vec<Effect>> {
        self.check_not_entered()?;
        self.check_no_payment(ctx)?;
        self.require_admin(ctx)?;
        if collecting_period == 0 {
            return Err(delegation::DelegationError::InvalidCollectingPeriod.into());
        }
        self.config.collecting_period = collecting_period;
        Ok(Vec::new())
    }

    // --- internals ---

    fn check_not_entered(&self) -> DexCoreResult<()> {
        if self.entered {
            return Err(DexCoreError::ReentrancyDetected);
        }
        Ok(())
    }

    fn check_no_payment(&self, ctx: &CallContext) -> DexCoreResult<()> {
        if !ctx.payment.is_zero() {
            return Err(DexCoreError::UnexpectedNativePayment);
        }
        Ok(())
    }

    /// A native input must arrive as the attached payment, exactly;
    /// calls without a native input must not carry one
    fn check_native_payment(
        &self,
        ctx: &CallContext,
        input_token: &TokenId,
        amount: &Amount,
    ) -> DexCoreResult<()> {
        let expected = if input_token.is_native() {
            amount.clone()
        } else {
            Amount::zero()
        };
        if ctx.payment != expected {
            return Err(DexCoreError::UnexpectedNativePayment);
        }
        Ok(())
    }

    fn check_deadline(&self, ctx: &CallContext, deadline: Timestamp) -> DexCoreResult<()> {
        if ctx.now > deadline {
            return Err(DexCoreError::DeadlineExpired);
        }
        Ok(())
    }

    fn require_admin(&self, ctx: &CallContext) -> DexCoreResult<()> {
        if ctx.sender != self.admin {
            return Err(DexCoreError::AccessDenied);
        }
        Ok(())
    }

    /// Advance the pair's reward accumulator and settle one holder's
    /// accrual across a balance change. Must run before the ledger
    /// mutation, with the pre-change total supply in place.
    fn settle_holder_rewards(
        &mut self,
        pair_id: PairId,
        holder: &Address,
        balance_after: &Amount,
        level: BlockNumber,
    ) -> DexCoreResult<()> {
        let total = match self.pairs.get(&pair_id) {
            Some(pair) => pair.total_shares.clone(),
            None => return Ok(()),
        };
        let collecting_period = self.config.collecting_period;
        if let Some(state) = self.rewards.get_mut(&pair_id) {
            state.update(&total, level, collecting_period)?;
            let balance_before = self.ledger.balance_of(holder, pair_id);
            let voter = self.voter_rewards.entry((pair_id, *holder)).or_default();
            state.update_voter(voter, &balance_before, balance_after);
        }
        Ok(())
    }

    /// Re-submit a holder's vote with their current balance. Explicit
    /// candidates are vetted against the delegate registry; with no
    /// explicit candidate the standing one is reused, and holders who
    /// never voted stay out of the tally.
    fn refresh_vote(
        &mut self,
        pair_id: PairId,
        holder: &Address,
        candidate: Option<Address>,
        now: Timestamp,
    ) -> DexCoreResult<Option<Effect>> {
        let balance = self.ledger.balance_of(holder, pair_id);
        let store = match self.delegation.get_mut(&pair_id) {
            Some(store) => store,
            None => return Ok(None),
        };
        if let Some(chosen) = candidate {
            self.delegate_registry.validate_or_register(chosen)?;
            if store.is_banned(&chosen, now) {
                return Err(DexCoreError::DelegationTargetBanned);
            }
        }
        let candidate = match candidate.or_else(|| store.voter(holder).and_then(|v| v.candidate)) {
            Some(candidate) => candidate,
            None => return Ok(None),
        };
        Ok(store
            .vote(*holder, candidate, balance, now)
            .map(|delegate| Effect::Delegation { pair_id, delegate }))
    }
}
