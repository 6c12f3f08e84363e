//! Keeper: closes rounds whose deadline has passed.
//!
//! `close_lottery` is permissionless, so the service runs its own closer on
//! a timer rather than waiting for a participant to call it.

use tracing::{debug, info, warn};

use crate::engine::lottery::Lottery;
use crate::funding::FundingSource;
use crate::ledger::CreditLedger;
use crate::types::{AccountId, RoundOutcome};

/// Close the round if it is open and past its deadline.
///
/// Returns the outcome when a round was closed, `None` when there was
/// nothing to do or the close failed (failures are logged, not raised, so
/// the timer keeps running).
pub fn run_keeper_tick<L: CreditLedger, F: FundingSource>(
    lottery: &mut Lottery<L, F>,
    closer: &AccountId,
) -> Option<RoundOutcome> {
    if !lottery.ready_to_close() {
        debug!(
            bets_open = lottery.bets_open(),
            closing_time = lottery.bets_closing_time(),
            "Keeper: nothing to close"
        );
        return None;
    }

    match lottery.close_lottery(closer) {
        Ok(outcome) => {
            info!(%outcome, "Keeper closed round");
            Some(outcome)
        }
        Err(e) => {
            warn!(error = %e, "Keeper failed to close round");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::{LotteryService, LotterySettings};
    use crate::entropy::FixedEntropy;
    use crate::funding::NativeVault;
    use std::sync::Arc;

    const START: i64 = 1_700_000_000;

    fn make_lottery() -> (LotteryService, ManualClock) {
        let clock = ManualClock::new(START);
        let lottery = LotteryService::with_new_token(
            "Lottery Credit",
            "LTC",
            LotterySettings {
                purchase_ratio: 100,
                bet_price: 10,
                bet_fee: 1,
            },
            AccountId::from("admin"),
            NativeVault::new(),
            Box::new(FixedEntropy(0)),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (lottery, clock)
    }

    #[test]
    fn test_tick_on_closed_round_is_noop() {
        let (mut lottery, _) = make_lottery();
        assert!(run_keeper_tick(&mut lottery, &AccountId::from("keeper")).is_none());
        assert_eq!(lottery.rounds_closed(), 0);
    }

    #[test]
    fn test_tick_before_deadline_is_noop() {
        let (mut lottery, clock) = make_lottery();
        lottery.open_bets(&AccountId::from("admin"), START + 30).unwrap();
        clock.set(START + 29);
        assert!(run_keeper_tick(&mut lottery, &AccountId::from("keeper")).is_none());
        assert!(lottery.bets_open());
    }

    #[test]
    fn test_tick_after_deadline_closes() {
        let (mut lottery, clock) = make_lottery();
        lottery.open_bets(&AccountId::from("admin"), START + 30).unwrap();
        clock.set(START + 30);

        let outcome = run_keeper_tick(&mut lottery, &AccountId::from("keeper")).unwrap();
        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.winner, None);
        assert!(!lottery.bets_open());

        // Second tick has nothing left to close.
        assert!(run_keeper_tick(&mut lottery, &AccountId::from("keeper")).is_none());
    }
}
