//! Accountant: pool reconciliation.
//!
//! Checks that the credits sitting in custody exactly cover what the
//! lottery owes (prize pool + owner pool + unclaimed prizes), and that the
//! native reserve backs every credit in circulation at the purchase ratio.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::lottery::Lottery;
use crate::funding::FundingSource;
use crate::ledger::CreditLedger;
use crate::types::{Credits, NativeAmount};

// ---------------------------------------------------------------------------
// Reconciliation report
// ---------------------------------------------------------------------------

/// Snapshot of custody holdings against pool liabilities.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// Credits held by the custody account on the ledger.
    pub custody_balance: Credits,
    pub prize_pool: Credits,
    pub owner_pool: Credits,
    /// Sum of all unclaimed per-account prize balances.
    pub unclaimed_prizes: Credits,
    /// Native currency held by the lottery.
    pub native_reserve: NativeAmount,
    /// Native currency needed to redeem every credit in circulation.
    pub redemption_liability: u128,
    pub timestamp: chrono::DateTime<Utc>,
}

impl ReconciliationReport {
    /// Credits the lottery owes to bettors, winners and the administrator.
    pub fn liabilities(&self) -> u128 {
        self.prize_pool as u128 + self.owner_pool as u128 + self.unclaimed_prizes as u128
    }

    /// Custody holdings minus liabilities. Zero when books balance.
    pub fn custody_surplus(&self) -> i128 {
        self.custody_balance as i128 - self.liabilities() as i128
    }

    /// Whether custody exactly covers liabilities and the reserve covers
    /// redemptions.
    pub fn is_balanced(&self) -> bool {
        self.custody_surplus() == 0 && self.native_reserve as u128 >= self.redemption_liability
    }
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

pub struct Accountant;

impl Accountant {
    /// Compare custody and reserve against what the lottery owes.
    pub fn reconcile<L: CreditLedger, F: FundingSource>(lottery: &Lottery<L, F>) -> ReconciliationReport {
        let state = lottery.state();
        let report = ReconciliationReport {
            custody_balance: lottery.ledger().balance_of(lottery.custody()),
            prize_pool: state.prize_pool,
            owner_pool: state.owner_pool,
            unclaimed_prizes: state.total_prize_balances(),
            native_reserve: lottery.funding().reserve(),
            redemption_liability: lottery.ledger().total_supply() as u128
                * state.settings.purchase_ratio as u128,
            timestamp: Utc::now(),
        };

        if report.is_balanced() {
            info!(
                custody = report.custody_balance,
                liabilities = report.liabilities() as u64,
                reserve = report.native_reserve,
                "Books balanced"
            );
        } else {
            warn!(
                custody = report.custody_balance,
                liabilities = %report.liabilities(),
                surplus = %report.custody_surplus(),
                reserve = report.native_reserve,
                redemption_liability = %report.redemption_liability,
                "Books out of balance"
            );
        }

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
