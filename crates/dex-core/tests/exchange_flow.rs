// dex-core/tests/exchange_flow.rs
//
// End-to-end flows across the exchange core and the fee auction,
// wired the way a substrate would: effects returned by one component
// are fed into the next.

use dex_core::{
    CallContext, Continuation, DexCore, Effect, ExchangeConfig, RouteLeg, SwapDirection,
    SwapParams, TransferDestination, TransferItem,
};
use exchange_core::{Amount, TokenId};
use exchange_crypto::{Address, Hashable, KeyPair};
use fee_auction::{AuctionConfig, AuctionHouse};

const SELF_ADDRESS: [u8; 20] = [200; 20];

fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

fn amt(v: u64) -> Amount {
    Amount::from_u64(v)
}

fn token(byte: u8) -> TokenId {
    TokenId::Single(addr(byte))
}

fn rate_percent(n: u64) -> Amount {
    Amount::new(num_bigint::BigUint::from(n) * num_bigint::BigUint::from(10u64).pow(16))
}

fn ctx(sender: Address, now: u64, level: u64) -> CallContext {
    CallContext::new(sender, now, level)
}

fn create_core() -> DexCore {
    DexCore::new(Address::new(SELF_ADDRESS), addr(1), ExchangeConfig::default()).unwrap()
}

fn create_auction_house() -> AuctionHouse {
    AuctionHouse::new(
        addr(1),
        AuctionConfig {
            bid_token: token(100),
            auction_duration: 1_000,
            min_bid: amt(10),
            dev_fee: rate_percent(10),
            bid_fee: rate_percent(10),
            extension_trigger: 60,
            extension_duration: 120,
        },
    )
}

#[test]
fn test_protocol_fees_flow_into_the_auction() {
    let mut core = create_core();
    let mut house = create_auction_house();

    core.launch_pair(
        &ctx(addr(2), 0, 0),
        token(10),
        token(11),
        amt(5_000_000),
        amt(5_000_000),
        addr(2),
        None,
    )
    .unwrap();
    let pair_id = core.pair_id(&token(10), &token(11)).unwrap();

    // a burst of trades accrues protocol fees in the input token
    for i in 0..5u64 {
        core.swap(
            &ctx(addr(3), 10 + i, i),
            SwapParams {
                legs: vec![RouteLeg {
                    pair_id,
                    direction: SwapDirection::AToB,
                }],
                amount_in: amt(100_000),
                min_amount_out: Amount::zero(),
                receiver: addr(3),
                referrer: addr(4),
                deadline: 10_000,
            },
        )
        .unwrap();
    }
    // 0.25% of 5 × 100_000
    assert_eq!(core.fee_balances().protocol_balance(&token(10)), amt(1_250));

    // anyone may trigger the hand-off; the substrate routes the
    // continuation into the auction engine
    let effects = core
        .withdraw_protocol_fee(&ctx(addr(5), 20, 5), token(10))
        .unwrap();
    let mut shipped = Amount::zero();
    for effect in effects {
        match effect {
            Effect::Transfer { to, amount, .. } => {
                assert_eq!(to, addr(5));
                // the caller keeps 5% as the trigger incentive
                assert_eq!(amount, amt(62));
            }
            Effect::Continuation(Continuation::ReceiveFee { token: fee_token, amount }) => {
                house.receive_fee(fee_token, amount.clone()).unwrap();
                shipped = amount;
            }
            Effect::Continuation(Continuation::Close) => {
                core.close(&ctx(Address::new(SELF_ADDRESS), 20, 5)).unwrap();
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }
    assert_eq!(shipped, amt(1_188));
    assert!(!core.is_entered());

    // 10% dev cut on intake, the rest is auctionable
    assert_eq!(house.dev_balance(&token(10)), amt(118));
    assert_eq!(house.public_balance(&token(10)), amt(1_070));

    // auction the lot, outbid once, claim after the close
    let id = house
        .launch_auction(addr(6), token(10), amt(1_000), amt(50), 100)
        .unwrap();
    let refund = house.place_bid(addr(7), id, amt(80), 200).unwrap();
    assert_eq!(refund.to, addr(6));
    assert_eq!(refund.amount, amt(45));

    let payments = house.claim(id, 1_200).unwrap();
    assert_eq!(payments[0].to, addr(7));
    assert_eq!(payments[0].amount, amt(1_000));
    // the winning bid is burned
    assert_eq!(payments[1].to, Address::zero());
    assert_eq!(payments[1].amount, amt(80));
}

#[test]
fn test_native_pair_votes_rewards_and_payout() {
    let mut config = ExchangeConfig::default();
    config.collecting_period = 10;
    let mut core = DexCore::new(Address::new(SELF_ADDRESS), addr(1), config).unwrap();

    let delegate_a = addr(50);
    let delegate_b = addr(51);

    let effects = core
        .launch_pair(
            &ctx(addr(2), 0, 0).with_payment(amt(1_000)),
            TokenId::Native,
            token(11),
            amt(1_000),
            amt(1_000),
            addr(2),
            Some(delegate_a),
        )
        .unwrap();
    assert_eq!(
        effects,
        vec![Effect::Delegation {
            pair_id: 0,
            delegate: delegate_a
        }]
    );

    // a bigger investor backing another delegate flips the selection
    let effects = core
        .invest(
            &ctx(addr(3), 10, 1).with_payment(amt(2_000)),
            0,
            amt(2_000),
            addr(3),
            amt(2_000),
            amt(2_000),
            Some(delegate_b),
            10_000,
        )
        .unwrap();
    assert!(effects.contains(&Effect::Delegation {
        pair_id: 0,
        delegate: delegate_b
    }));
    let store = core.delegation_store(0).unwrap();
    assert_eq!(store.current_delegate(), Some(delegate_b));
    assert_eq!(store.next_candidate(), Some(delegate_a));

    // rewards arrive, a full period passes, both holders settle
    core.fill(&ctx(addr(9), 20, 2).with_payment(amt(3_000)), 0)
        .unwrap();
    let effects = core
        .withdraw_profit(&ctx(addr(2), 500, 50), 0, addr(2))
        .unwrap();
    let small = match &effects[0] {
        Effect::Continuation(Continuation::PourOut { amount, .. }) => amount.clone(),
        other => panic!("expected a pour-out, got {:?}", other),
    };
    core.close(&ctx(Address::new(SELF_ADDRESS), 500, 50)).unwrap();
    let effects = core
        .withdraw_profit(&ctx(addr(3), 500, 50), 0, addr(3))
        .unwrap();
    let big = match &effects[0] {
        Effect::Continuation(Continuation::PourOut { amount, .. }) => amount.clone(),
        other => panic!("expected a pour-out, got {:?}", other),
    };
    core.close(&ctx(Address::new(SELF_ADDRESS), 500, 50)).unwrap();

    // payouts split pro rata to shares, nothing is over-distributed
    assert_eq!(big, small.clone() + small.clone());
    assert!(small.clone() + big <= amt(3_000));
}

#[test]
fn test_permit_authorizes_a_stranger_once() {
    let mut core = create_core();
    let owner = KeyPair::generate();
    let owner_addr = owner.address();

    core.launch_pair(
        &ctx(owner_addr, 0, 0),
        token(10),
        token(11),
        amt(1_000),
        amt(1_000),
        owner_addr,
        None,
    )
    .unwrap();
    let pair_id = core.pair_id(&token(10), &token(11)).unwrap();

    let batch = vec![TransferItem {
        from: owner_addr,
        destinations: vec![TransferDestination {
            to: addr(4),
            pair_id,
            amount: amt(250),
        }],
    }];
    let param_hash = bincode::serialize(&batch).unwrap().hash();

    // the owner signs off-chain; a relayer submits both steps
    let message = core
        .permits()
        .expected_message(&Address::new(SELF_ADDRESS), &param_hash)
        .unwrap();
    let signature = owner.sign(message.as_bytes());
    core.permit(
        &ctx(addr(9), 10, 1),
        owner.public_key(),
        &signature,
        param_hash,
    )
    .unwrap();

    core.transfer(&ctx(addr(9), 20, 2), batch.clone()).unwrap();
    assert_eq!(core.ledger().balance_of(&addr(4), pair_id), amt(250));
    assert_eq!(core.ledger().balance_of(&owner_addr, pair_id), amt(750));

    // the permit is spent; replaying the same batch fails
    assert!(core.transfer(&ctx(addr(9), 30, 3), batch).is_err());
}

#[test]
fn test_share_supply_matches_ledger_through_mixed_traffic() {
    let mut core = create_core();
    core.launch_pair(
        &ctx(addr(2), 0, 0),
        token(10),
        token(11),
        amt(10_000),
        amt(10_000),
        addr(2),
        None,
    )
    .unwrap();
    let pair_id = core.pair_id(&token(10), &token(11)).unwrap();

    let holders = [addr(2), addr(3), addr(5), addr(6)];
    for (i, holder) in holders.iter().enumerate().skip(1) {
        core.invest(
            &ctx(*holder, 10 + i as u64, i as u64),
            pair_id,
            amt(500 * i as u64),
            *holder,
            amt(500 * i as u64),
            amt(500 * i as u64),
            None,
            10_000,
        )
        .unwrap();
    }
    core.divest(
        &ctx(addr(3), 100, 10),
        pair_id,
        amt(200),
        amt(1),
        amt(1),
        addr(3),
        10_000,
    )
    .unwrap();
    core.transfer(
        &ctx(addr(5), 110, 11),
        vec![TransferItem {
            from: addr(5),
            destinations: vec![TransferDestination {
                to: addr(6),
                pair_id,
                amount: amt(123),
            }],
        }],
    )
    .unwrap();

    let ledger_sum = holders
        .iter()
        .fold(Amount::zero(), |sum, holder| {
            sum + core.ledger().balance_of(holder, pair_id)
        });
    assert_eq!(ledger_sum, core.pair(pair_id).unwrap().total_shares);
}
