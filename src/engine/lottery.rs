//! Round controller and pool ledger.
//!
//! Owns the round lifecycle (Closed ⇄ Open), the bet slot list, the prize
//! pool, the owner fee pool and per-account prize balances. Every public
//! operation takes `&mut self` and either commits fully or returns an error
//! with nothing changed; `bet_many` is the one exception (earlier iterations
//! stay committed when a later one fails).
//!
//! Credits held on behalf of the pools sit in the custody account on the
//! credit ledger. Bettors approve the custody account before betting or
//! returning credits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::entropy::{genesis_digest, roll_history, EntropySeed, EntropySource};
use crate::funding::FundingSource;
use crate::ledger::{CreditLedger, CreditToken};
use crate::types::{
    AccountId, Credits, LotteryError, LotteryResult, NativeAmount, RoundOutcome, RoundStatus,
    Timestamp,
};

/// Ledger account that holds pool credits.
pub const DEFAULT_CUSTODY_ACCOUNT: &str = "lottery-custody";

// ---------------------------------------------------------------------------
// Settings and state
// ---------------------------------------------------------------------------

/// Economic parameters, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotterySettings {
    /// Native units per credit.
    pub purchase_ratio: NativeAmount,
    /// Credits added to the prize pool per bet.
    pub bet_price: Credits,
    /// Credits added to the owner pool per bet.
    pub bet_fee: Credits,
}

impl LotterySettings {
    pub fn validate(&self) -> LotteryResult<()> {
        if self.purchase_ratio == 0 {
            return Err(LotteryError::InvalidArgument(
                "purchase ratio must be greater than 0".into(),
            ));
        }
        self.bet_cost()?;
        Ok(())
    }

    /// Credits a single bet pulls from the bettor.
    pub fn bet_cost(&self) -> LotteryResult<Credits> {
        self.bet_price
            .checked_add(self.bet_fee)
            .ok_or_else(|| LotteryError::Overflow("bet price + bet fee".into()))
    }
}

/// Everything the controller owns, in one serialisable struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryState {
    pub settings: LotterySettings,
    pub admin: AccountId,
    pub custody: AccountId,
    pub bets_open: bool,
    pub bets_closing_time: Timestamp,
    /// One entry per accepted bet since the last close.
    pub slots: Vec<AccountId>,
    pub prize_pool: Credits,
    pub owner_pool: Credits,
    pub prize_balances: BTreeMap<AccountId, Credits>,
    /// Number of rounds closed so far.
    pub rounds_closed: u64,
    /// Hash chain over committed operations; feeds the weak entropy source.
    pub history_digest: String,
}

impl LotteryState {
    pub fn new(settings: LotterySettings, admin: AccountId, custody: AccountId) -> Self {
        Self {
            settings,
            admin,
            custody,
            bets_open: false,
            bets_closing_time: 0,
            slots: Vec::new(),
            prize_pool: 0,
            owner_pool: 0,
            prize_balances: BTreeMap::new(),
            rounds_closed: 0,
            history_digest: genesis_digest(),
        }
    }

    /// Sum of all withdrawable prize balances.
    pub fn total_prize_balances(&self) -> Credits {
        self.prize_balances.values().sum()
    }

    /// Reject pool figures that no sequence of operations could produce.
    pub fn check_pools(&self) -> LotteryResult<()> {
        let expected = (self.slots.len() as u64)
            .checked_mul(self.settings.bet_price)
            .ok_or_else(|| LotteryError::Overflow("prize pool".into()))?;
        if self.prize_pool != expected {
            return Err(LotteryError::InvalidArgument(format!(
                "prize pool {} does not match {} slots at price {}",
                self.prize_pool,
                self.slots.len(),
                self.settings.bet_price
            )));
        }
        if !self.bets_open && !self.slots.is_empty() {
            return Err(LotteryError::InvalidArgument(
                "closed round still holds bet slots".into(),
            ));
        }
        if self.slots.contains(&self.custody) || self.prize_balances.contains_key(&self.custody) {
            return Err(LotteryError::InvalidArgument(
                "custody account appears as a participant".into(),
            ));
        }
        Ok(())
    }
}

/// Read-only view of the public state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryStatus {
    pub token_name: String,
    pub token_symbol: String,
    pub custody: AccountId,
    pub admin: AccountId,
    pub purchase_ratio: NativeAmount,
    pub bet_price: Credits,
    pub bet_fee: Credits,
    pub prize_pool: Credits,
    pub owner_pool: Credits,
    pub bets_open: bool,
    pub bets_closing_time: Timestamp,
    pub accepting_bets: bool,
    pub slot_count: usize,
    pub rounds_closed: u64,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Lottery<L: CreditLedger, F: FundingSource> {
    state: LotteryState,
    ledger: L,
    funding: F,
    entropy: Box<dyn EntropySource>,
    clock: Arc<dyn Clock>,
}

impl<F: FundingSource> Lottery<CreditToken, F> {
    /// Build a lottery with a fresh in-memory credit named `token_name`.
    pub fn with_new_token(
        token_name: &str,
        token_symbol: &str,
        settings: LotterySettings,
        admin: AccountId,
        funding: F,
        entropy: Box<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> LotteryResult<Self> {
        let ledger = CreditToken::new(token_name, token_symbol);
        Self::new(settings, admin, ledger, funding, entropy, clock)
    }
}

impl<L: CreditLedger, F: FundingSource> Lottery<L, F> {
    pub fn new(
        settings: LotterySettings,
        admin: AccountId,
        ledger: L,
        funding: F,
        entropy: Box<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> LotteryResult<Self> {
        let state = LotteryState::new(settings, admin, AccountId::from(DEFAULT_CUSTODY_ACCOUNT));
        Self::restore(state, ledger, funding, entropy, clock)
    }

    /// Rebuild a controller from persisted parts.
    pub fn restore(
        state: LotteryState,
        ledger: L,
        funding: F,
        entropy: Box<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> LotteryResult<Self> {
        state.settings.validate()?;
        if state.admin.is_empty() {
            return Err(LotteryError::InvalidArgument("administrator must be set".into()));
        }
        if state.custody.is_empty() || state.custody == state.admin {
            return Err(LotteryError::InvalidArgument(
                "custody account must be set and differ from the administrator".into(),
            ));
        }
        state.check_pools()?;
        info!(
            admin = %state.admin,
            token = ledger.symbol(),
            purchase_ratio = state.settings.purchase_ratio,
            bet_price = state.settings.bet_price,
            bet_fee = state.settings.bet_fee,
            entropy = entropy.name(),
            "Lottery ready"
        );
        Ok(Self {
            state,
            ledger,
            funding,
            entropy,
            clock,
        })
    }

    /// Split into persisted parts.
    pub fn into_parts(self) -> (LotteryState, L, F) {
        (self.state, self.ledger, self.funding)
    }

    // -- Round lifecycle --------------------------------------------------

    /// Open a betting round that accepts bets until `closing_time`.
    pub fn open_bets(&mut self, caller: &AccountId, closing_time: Timestamp) -> LotteryResult<()> {
        self.only_admin(caller, "open bets")?;
        if self.state.bets_open {
            return Err(LotteryError::State("bets are already open".into()));
        }
        let now = self.clock.now();
        if closing_time <= now {
            return Err(LotteryError::InvalidArgument(format!(
                "closing time {closing_time} is not in the future (now {now})"
            )));
        }

        self.state.bets_closing_time = closing_time;
        self.state.bets_open = true;
        self.record(format!("open:{closing_time}"));

        info!(closing_time, round = self.state.rounds_closed + 1, "Bets opened");
        Ok(())
    }

    /// Place one bet of `bet_price + bet_fee` credits.
    pub fn bet(&mut self, caller: &AccountId) -> LotteryResult<()> {
        self.reject_custody(caller, "bet")?;
        let now = self.clock.now();
        if !self.accepting_bets_at(now) {
            return Err(LotteryError::State("round not open".into()));
        }

        let cost = self.state.settings.bet_cost()?;
        let prize_pool = self
            .state
            .prize_pool
            .checked_add(self.state.settings.bet_price)
            .ok_or_else(|| LotteryError::Overflow("prize pool".into()))?;
        let owner_pool = self
            .state
            .owner_pool
            .checked_add(self.state.settings.bet_fee)
            .ok_or_else(|| LotteryError::Overflow("owner pool".into()))?;

        // Everything after the transfer is infallible.
        let custody = self.state.custody.clone();
        self.ledger.transfer_from(&custody, caller, &custody, cost)?;

        self.state.owner_pool = owner_pool;
        self.state.prize_pool = prize_pool;
        self.state.slots.push(caller.clone());
        self.record(format!("bet:{caller}:{now}"));

        debug!(
            %caller,
            slots = self.state.slots.len(),
            prize_pool,
            owner_pool,
            "Bet accepted"
        );
        Ok(())
    }

    /// Place `times` bets in sequence. Bets accepted before a failing
    /// iteration stay committed.
    pub fn bet_many(&mut self, caller: &AccountId, times: u32) -> LotteryResult<()> {
        if times == 0 {
            return Err(LotteryError::InvalidArgument(
                "number of bets must be greater than 0".into(),
            ));
        }
        for accepted in 0..times {
            if let Err(e) = self.bet(caller) {
                warn!(%caller, requested = times, accepted, error = %e, "Bet batch stopped");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Close the round once its deadline has passed. Anyone may call this.
    pub fn close_lottery(&mut self, caller: &AccountId) -> LotteryResult<RoundOutcome> {
        if !self.state.bets_open {
            return Err(LotteryError::State("bets are not open".into()));
        }
        let now = self.clock.now();
        if now < self.state.bets_closing_time {
            return Err(LotteryError::TooSoon {
                closing_time: self.state.bets_closing_time,
                now,
            });
        }

        let slot_count = self.state.slots.len();
        let prize = self.state.prize_pool;
        let mut winner = None;
        let mut winner_index = None;

        if slot_count > 0 {
            let seed = EntropySeed {
                history_digest: self.state.history_digest.clone(),
                closed_at: now,
                slot_count,
            };
            let random = self.entropy.weak_random(&seed);
            let index = (random % slot_count as u64) as usize;
            let account = self.state.slots[index].clone();

            let balance = self
                .prize_balance(&account)
                .checked_add(prize)
                .ok_or_else(|| LotteryError::Overflow(format!("prize balance of {account}")))?;

            self.state.prize_balances.insert(account.clone(), balance);
            self.state.prize_pool = 0;
            self.state.slots.clear();

            winner = Some(account);
            winner_index = Some(index);
        }

        self.state.bets_open = false;
        self.state.rounds_closed += 1;

        let outcome = RoundOutcome {
            round: self.state.rounds_closed,
            winner,
            winner_index,
            prize: if slot_count > 0 { prize } else { 0 },
            slot_count,
            closed_at: now,
        };
        self.record(format!("close:{}:{}", outcome.round, now));

        info!(
            %caller,
            round = outcome.round,
            winner = ?outcome.winner,
            prize = outcome.prize,
            slots = slot_count,
            "Round closed"
        );
        Ok(outcome)
    }

    // -- Withdrawals --------------------------------------------------------

    /// Pay out part or all of the caller's prize balance.
    pub fn prize_withdraw(&mut self, caller: &AccountId, amount: Credits) -> LotteryResult<()> {
        self.reject_custody(caller, "withdraw prizes")?;
        let available = self.prize_balance(caller);
        if amount > available {
            return Err(LotteryError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if amount == 0 {
            return Ok(());
        }

        self.state
            .prize_balances
            .insert(caller.clone(), available - amount);
        let custody = self.state.custody.clone();
        if let Err(e) = self.ledger.transfer(&custody, caller, amount) {
            self.state.prize_balances.insert(caller.clone(), available);
            return Err(e.into());
        }
        self.record(format!("prize-withdraw:{caller}:{amount}"));

        info!(%caller, amount, remaining = available - amount, "Prize withdrawn");
        Ok(())
    }

    /// Pay out collected fees to the administrator.
    pub fn owner_withdraw(&mut self, caller: &AccountId, amount: Credits) -> LotteryResult<()> {
        self.only_admin(caller, "withdraw owner fees")?;
        let available = self.state.owner_pool;
        if amount > available {
            return Err(LotteryError::InsufficientBalance {
                needed: amount,
                available,
            });
        }

        self.state.owner_pool = available - amount;
        let custody = self.state.custody.clone();
        let admin = self.state.admin.clone();
        if let Err(e) = self.ledger.transfer(&custody, &admin, amount) {
            self.state.owner_pool = available;
            return Err(e.into());
        }
        self.record(format!("owner-withdraw:{amount}"));

        info!(amount, remaining = self.state.owner_pool, "Owner fees withdrawn");
        Ok(())
    }

    // -- Credit purchase and return ------------------------------------------

    /// Exchange native currency for credits at the fixed ratio. The division
    /// remainder stays in the reserve. Returns the number of credits minted.
    pub fn purchase_tokens(
        &mut self,
        payer: &AccountId,
        payment: NativeAmount,
    ) -> LotteryResult<Credits> {
        self.reject_custody(payer, "purchase credits")?;
        let minted = payment / self.state.settings.purchase_ratio;
        self.ledger
            .total_supply()
            .checked_add(minted)
            .ok_or_else(|| LotteryError::Overflow("credit supply".into()))?;

        self.funding.deposit(payer, payment)?;
        if let Err(e) = self.ledger.mint(payer, minted) {
            if let Err(refund) = self.funding.payout(payer, payment) {
                error!(%payer, payment, error = %refund, "Refund after failed mint did not complete");
            }
            return Err(e.into());
        }
        self.record(format!("purchase:{payer}:{payment}"));

        info!(
            %payer,
            payment,
            minted,
            kept = payment % self.state.settings.purchase_ratio,
            "Credits purchased"
        );
        Ok(minted)
    }

    /// Burn credits and pay back `amount × purchase_ratio` native currency.
    /// The caller must have approved the custody account for `amount`.
    pub fn return_tokens(
        &mut self,
        caller: &AccountId,
        amount: Credits,
    ) -> LotteryResult<NativeAmount> {
        self.reject_custody(caller, "return credits")?;
        let refund = amount
            .checked_mul(self.state.settings.purchase_ratio)
            .ok_or_else(|| LotteryError::Overflow("refund amount".into()))?;
        let reserve = self.funding.reserve();
        if refund > reserve {
            return Err(LotteryError::InsufficientBalance {
                needed: refund,
                available: reserve,
            });
        }

        let custody = self.state.custody.clone();
        let allowance = self.ledger.allowance(caller, &custody);
        self.ledger.burn_from(&custody, caller, amount)?;
        if let Err(e) = self.funding.payout(caller, refund) {
            // Undo the burn so the call has no effect.
            if let Err(remint) = self.ledger.mint(caller, amount) {
                error!(%caller, amount, error = %remint, "Re-mint after failed payout did not complete");
            }
            self.ledger.approve(caller, &custody, allowance);
            return Err(e.into());
        }
        self.record(format!("return:{caller}:{amount}"));

        info!(%caller, amount, refund, "Credits returned");
        Ok(refund)
    }

    /// Let `owner` authorise the custody account to pull `amount` credits.
    pub fn approve_custody(&mut self, owner: &AccountId, amount: Credits) -> LotteryResult<()> {
        self.reject_custody(owner, "approve itself")?;
        let custody = self.state.custody.clone();
        self.ledger.approve(owner, &custody, amount);
        Ok(())
    }

    // -- Queries --------------------------------------------------------------

    pub fn settings(&self) -> LotterySettings {
        self.state.settings
    }

    pub fn purchase_ratio(&self) -> NativeAmount {
        self.state.settings.purchase_ratio
    }

    pub fn bet_price(&self) -> Credits {
        self.state.settings.bet_price
    }

    pub fn bet_fee(&self) -> Credits {
        self.state.settings.bet_fee
    }

    pub fn prize_pool(&self) -> Credits {
        self.state.prize_pool
    }

    pub fn owner_pool(&self) -> Credits {
        self.state.owner_pool
    }

    pub fn bets_open(&self) -> bool {
        self.state.bets_open
    }

    pub fn bets_closing_time(&self) -> Timestamp {
        self.state.bets_closing_time
    }

    pub fn round_status(&self) -> RoundStatus {
        if self.state.bets_open {
            RoundStatus::Open
        } else {
            RoundStatus::Closed
        }
    }

    /// Whether a bet placed now would pass the round check.
    pub fn accepting_bets(&self) -> bool {
        self.accepting_bets_at(self.clock.now())
    }

    /// Whether the round is open and its deadline has passed.
    pub fn ready_to_close(&self) -> bool {
        self.state.bets_open && self.clock.now() >= self.state.bets_closing_time
    }

    pub fn prize_balance(&self, account: &AccountId) -> Credits {
        self.state.prize_balances.get(account).copied().unwrap_or(0)
    }

    pub fn slots(&self) -> &[AccountId] {
        &self.state.slots
    }

    pub fn slot_count(&self) -> usize {
        self.state.slots.len()
    }

    pub fn rounds_closed(&self) -> u64 {
        self.state.rounds_closed
    }

    pub fn admin(&self) -> &AccountId {
        &self.state.admin
    }

    pub fn custody(&self) -> &AccountId {
        &self.state.custody
    }

    pub fn state(&self) -> &LotteryState {
        &self.state
    }

    /// The payment credit this lottery settles in.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn funding(&self) -> &F {
        &self.funding
    }

    pub fn funding_mut(&mut self) -> &mut F {
        &mut self.funding
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn status(&self) -> LotteryStatus {
        LotteryStatus {
            token_name: self.ledger.name().to_string(),
            token_symbol: self.ledger.symbol().to_string(),
            custody: self.state.custody.clone(),
            admin: self.state.admin.clone(),
            purchase_ratio: self.state.settings.purchase_ratio,
            bet_price: self.state.settings.bet_price,
            bet_fee: self.state.settings.bet_fee,
            prize_pool: self.state.prize_pool,
            owner_pool: self.state.owner_pool,
            bets_open: self.state.bets_open,
            bets_closing_time: self.state.bets_closing_time,
            accepting_bets: self.accepting_bets(),
            slot_count: self.state.slots.len(),
            rounds_closed: self.state.rounds_closed,
        }
    }

    // -- Internals --------------------------------------------------------------

    fn accepting_bets_at(&self, now: Timestamp) -> bool {
        self.state.bets_open && now < self.state.bets_closing_time
    }

    fn only_admin(&self, caller: &AccountId, action: &str) -> LotteryResult<()> {
        if caller != &self.state.admin {
            return Err(LotteryError::Unauthorized(format!(
                "{caller} may not {action}"
            )));
        }
        Ok(())
    }

    /// The custody account only moves credits on the lottery's behalf.
    fn reject_custody(&self, caller: &AccountId, action: &str) -> LotteryResult<()> {
        if caller == &self.state.custody {
            return Err(LotteryError::InvalidArgument(format!(
                "custody account may not {action}"
            )));
        }
        Ok(())
    }

    fn record(&mut self, event: String) {
        self.state.history_digest = roll_history(&self.state.history_digest, &event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
