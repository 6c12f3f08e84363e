//! End-to-end round flows through the public API.
//!
//! Drives the controller the way the service binary wires it: in-memory
//! credit token, native vault, injected clock and fixed entropy.

use std::sync::Arc;

use lottery::clock::ManualClock;
use lottery::engine::accountant::Accountant;
use lottery::engine::keeper::run_keeper_tick;
use lottery::engine::{LotteryService, LotterySettings};
use lottery::entropy::FixedEntropy;
use lottery::funding::{FundingSource, NativeVault};
use lottery::ledger::CreditLedger;
use lottery::storage::{self, Snapshot};
use lottery::types::{AccountId, LotteryError, RoundStatus};

const START: i64 = 1_700_000_000;

fn settings() -> LotterySettings {
    LotterySettings {
        purchase_ratio: 100,
        bet_price: 10,
        bet_fee: 1,
    }
}

fn make_lottery(entropy: u64) -> (LotteryService, ManualClock) {
    let clock = ManualClock::new(START);
    let lottery = LotteryService::with_new_token(
        "Lottery Credit",
        "LTC",
        settings(),
        AccountId::from("admin"),
        NativeVault::new(),
        Box::new(FixedEntropy(entropy)),
        Arc::new(clock.clone()),
    )
    .unwrap();
    (lottery, clock)
}

fn buy(lottery: &mut LotteryService, who: &AccountId, payment: u64) -> u64 {
    lottery.funding_mut().fund(who, payment).unwrap();
    lottery.purchase_tokens(who, payment).unwrap()
}

#[test]
fn three_bettors_one_winner() {
    for entropy in 0..6u64 {
        let (mut lottery, clock) = make_lottery(entropy);
        let admin = AccountId::from("admin");
        let bettors: Vec<AccountId> = ["alice", "bob", "carol"]
            .into_iter()
            .map(AccountId::from)
            .collect();

        // 250 mints 2, not 2.5; the remaining 9 credits come from a second purchase.
        assert_eq!(buy(&mut lottery, &bettors[0], 250), 2);
        assert_eq!(buy(&mut lottery, &bettors[0], 900), 9);
        assert_eq!(buy(&mut lottery, &bettors[1], 1_100), 11);
        assert_eq!(buy(&mut lottery, &bettors[2], 1_100), 11);

        lottery.open_bets(&admin, START + 60).unwrap();
        for who in &bettors {
            lottery.approve_custody(who, 11).unwrap();
            lottery.bet(who).unwrap();
            assert_eq!(lottery.ledger().balance_of(who), 0);
        }

        assert_eq!(lottery.prize_pool(), 30);
        assert_eq!(lottery.owner_pool(), 3);
        assert_eq!(lottery.slot_count(), 3);

        clock.set(START + 61);
        let outcome = lottery.close_lottery(&AccountId::from("anyone")).unwrap();

        let expected = (entropy % 3) as usize;
        assert_eq!(outcome.winner_index, Some(expected));
        assert_eq!(outcome.winner.as_ref(), Some(&bettors[expected]));
        assert_eq!(outcome.prize, 30);
        assert_eq!(lottery.prize_pool(), 0);
        assert_eq!(lottery.slot_count(), 0);
        assert_eq!(lottery.round_status(), RoundStatus::Closed);

        for (i, who) in bettors.iter().enumerate() {
            let want = if i == expected { 30 } else { 0 };
            assert_eq!(lottery.prize_balance(who), want);
        }
        assert!(Accountant::reconcile(&lottery).is_balanced());
    }
}

#[test]
fn winner_cashes_out_to_native() {
    let (mut lottery, clock) = make_lottery(1);
    let admin = AccountId::from("admin");
    let alice = AccountId::from("alice");
    let bob = AccountId::from("bob");

    for who in [&alice, &bob] {
        buy(&mut lottery, who, 1_100);
        lottery.approve_custody(who, 11).unwrap();
    }
    lottery.open_bets(&admin, START + 10).unwrap();
    lottery.bet(&alice).unwrap();
    lottery.bet(&bob).unwrap();

    clock.advance(10);
    let outcome = lottery.close_lottery(&bob).unwrap();
    assert_eq!(outcome.winner, Some(bob.clone()));

    lottery.prize_withdraw(&bob, 20).unwrap();
    lottery.owner_withdraw(&admin, 2).unwrap();
    assert_eq!(lottery.ledger().balance_of(&bob), 20);
    assert_eq!(lottery.ledger().balance_of(&admin), 2);
    assert_eq!(lottery.ledger().balance_of(lottery.custody()), 0);

    lottery.approve_custody(&bob, 20).unwrap();
    let refund = lottery.return_tokens(&bob, 20).unwrap();
    assert_eq!(refund, 2_000);
    assert_eq!(lottery.funding().wallet_balance(&bob), 2_000);
    assert_eq!(lottery.funding().reserve(), 200);
    assert!(Accountant::reconcile(&lottery).is_balanced());
}

#[test]
fn purchase_then_return_rounds_down() {
    let (mut lottery, _) = make_lottery(0);
    let alice = AccountId::from("alice");

    let minted = buy(&mut lottery, &alice, 349);
    assert_eq!(minted, 3);
    lottery.approve_custody(&alice, minted).unwrap();
    assert_eq!(lottery.return_tokens(&alice, minted).unwrap(), 300);
    assert_eq!(lottery.funding().wallet_balance(&alice), 300);
    // The remainder stays behind.
    assert_eq!(lottery.funding().reserve(), 49);
}

#[test]
fn late_bet_rejected_while_round_still_flagged_open() {
    let (mut lottery, clock) = make_lottery(0);
    let alice = AccountId::from("alice");
    buy(&mut lottery, &alice, 2_200);
    lottery.approve_custody(&alice, 22).unwrap();
    lottery.open_bets(&AccountId::from("admin"), START + 5).unwrap();

    clock.set(START + 5);
    assert!(lottery.bets_open());
    assert!(matches!(lottery.bet(&alice), Err(LotteryError::State(_))));
    assert_eq!(lottery.ledger().balance_of(&alice), 22);
    assert_eq!(lottery.prize_pool(), 0);
}

#[test]
fn keeper_closes_empty_round_and_next_round_opens() {
    let (mut lottery, clock) = make_lottery(0);
    let admin = AccountId::from("admin");
    let keeper = AccountId::from("keeper");

    lottery.open_bets(&admin, START + 30).unwrap();
    clock.set(START + 45);
    let outcome = run_keeper_tick(&mut lottery, &keeper).unwrap();
    assert_eq!(outcome.winner, None);
    assert_eq!(outcome.prize, 0);

    lottery.open_bets(&admin, START + 90).unwrap();
    assert!(lottery.accepting_bets());
    assert_eq!(lottery.rounds_closed(), 1);
}

#[test]
fn restart_mid_round_then_close() {
    let mut path = std::env::temp_dir();
    path.push(format!("lottery_flow_{}.json", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().to_string();

    let (mut lottery, clock) = make_lottery(0);
    let alice = AccountId::from("alice");
    buy(&mut lottery, &alice, 3_300);
    lottery.approve_custody(&alice, 33).unwrap();
    lottery.open_bets(&AccountId::from("admin"), START + 60).unwrap();
    lottery.bet_many(&alice, 3).unwrap();

    storage::save_state(&Snapshot::capture(&lottery), Some(&path)).unwrap();
    drop(lottery);

    let mut restored = storage::load_state(Some(&path))
        .unwrap()
        .unwrap()
        .restore(Box::new(FixedEntropy(0)), Arc::new(clock.clone()))
        .unwrap();
    assert_eq!(restored.slot_count(), 3);

    clock.set(START + 60);
    let outcome = restored.close_lottery(&alice).unwrap();
    assert_eq!(outcome.prize, 30);
    assert_eq!(restored.prize_balance(&alice), 30);

    storage::delete_state(Some(&path)).unwrap();
}

fn assert_balanced(lottery: &LotteryService, step: &str) {
    let report = Accountant::reconcile(lottery);
    assert!(
        report.is_balanced(),
        "books out of balance after {step}: surplus {}",
        report.custody_surplus()
    );
}

#[test]
fn books_balance_with_admin_and_custody_as_callers() {
    let (mut lottery, clock) = make_lottery(1);
    let admin = AccountId::from("admin");
    let custody = lottery.custody().clone();
    let alice = AccountId::from("alice");

    buy(&mut lottery, &alice, 2_200);
    buy(&mut lottery, &admin, 1_100);
    lottery.approve_custody(&alice, 22).unwrap();
    lottery.approve_custody(&admin, 11).unwrap();
    assert_balanced(&lottery, "purchases");

    lottery.open_bets(&admin, START + 60).unwrap();
    lottery.bet(&alice).unwrap();
    assert_balanced(&lottery, "alice bet");

    // The custody account holds the pool credits and cannot spend them as a bettor.
    assert!(lottery.approve_custody(&custody, 1_000).is_err());
    assert!(lottery.bet(&custody).is_err());
    assert!(lottery.bet_many(&custody, 3).is_err());
    assert_balanced(&lottery, "custody bet attempts");

    assert!(lottery.return_tokens(&custody, 11).is_err());
    assert_eq!(lottery.ledger().balance_of(&custody), 11);
    assert_balanced(&lottery, "custody return attempt");

    lottery.bet(&admin).unwrap();
    lottery.bet(&alice).unwrap();
    assert_eq!(lottery.slot_count(), 3);
    assert_balanced(&lottery, "admin bet");

    clock.set(START + 60);
    let outcome = lottery.close_lottery(&custody).unwrap();
    assert_eq!(outcome.winner, Some(admin.clone()));
    assert_eq!(outcome.prize, 30);
    assert_balanced(&lottery, "close");

    assert!(lottery.prize_withdraw(&custody, 0).is_err());
    assert!(lottery.prize_withdraw(&alice, 1).is_err());
    lottery.prize_withdraw(&admin, 30).unwrap();
    assert_balanced(&lottery, "prize withdrawal");

    assert!(lottery.owner_withdraw(&custody, 3).is_err());
    lottery.owner_withdraw(&admin, 3).unwrap();
    assert_balanced(&lottery, "owner withdrawal");

    assert_eq!(lottery.ledger().balance_of(&custody), 0);
    assert_eq!(lottery.ledger().balance_of(&admin), 33);
    lottery.approve_custody(&admin, 33).unwrap();
    assert_eq!(lottery.return_tokens(&admin, 33).unwrap(), 3_300);
    assert_balanced(&lottery, "admin cash-out");
}

#[test]
fn custody_caller_rejected_over_http() {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use lottery::api::{build_router, ApiState};
    use tower::ServiceExt;

    let (lottery, _) = make_lottery(0);
    let custody = lottery.custody().to_string();
    let app = build_router(Arc::new(ApiState::new(lottery, None)));

    let body = serde_json::json!({"caller": custody, "amount": 1_000}).to_string();
    let status = tokio_test::block_on(async {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/approve")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    });
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn router_serves_status() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lottery::api::{build_router, ApiState};
    use tower::ServiceExt;

    let (lottery, _) = make_lottery(0);
    let app = build_router(Arc::new(ApiState::new(lottery, None)));

    let status = tokio_test::block_on(async {
        app.oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    });
    assert_eq!(status, StatusCode::OK);
}
