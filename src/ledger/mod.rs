//! Credit ledger integration.
//!
//! Defines the `CreditLedger` trait the round controller pays bets and
//! prizes through, and provides an in-memory implementation:
//! - `CreditToken`: fungible credit with balances and spending allowances

pub mod token;

use crate::types::{AccountId, Credits, LotteryError};

pub use token::CreditToken;

/// Errors raised by a credit ledger. Operations fail instead of truncating,
/// and a failed operation leaves the ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient credit balance for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        account: AccountId,
        needed: Credits,
        available: Credits,
    },

    #[error("Insufficient allowance from {owner} to {spender}: need {needed}, have {available}")]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
        needed: Credits,
        available: Credits,
    },

    #[error("Credit supply overflow")]
    SupplyOverflow,
}

impl From<LedgerError> for LotteryError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientBalance { needed, available, .. } => {
                LotteryError::InsufficientBalance { needed, available }
            }
            LedgerError::InsufficientAllowance { needed, available, .. } => {
                LotteryError::InsufficientAllowance { needed, available }
            }
            LedgerError::SupplyOverflow => LotteryError::Overflow("credit supply".into()),
        }
    }
}

/// Abstraction over the fungible-credit ledger.
///
/// There is no implicit message sender: every operation names the account
/// acting on the ledger. `transfer_from` and `burn_from` consume an allowance
/// the owner previously granted to `spender`.
pub trait CreditLedger: Send {
    /// Display name of the credit unit.
    fn name(&self) -> &str;

    /// Ticker symbol of the credit unit.
    fn symbol(&self) -> &str;

    fn total_supply(&self) -> Credits;

    fn balance_of(&self, account: &AccountId) -> Credits;

    /// Remaining amount `spender` may move on behalf of `owner`.
    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Credits;

    /// Set (not add to) the allowance from `owner` to `spender`.
    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Credits);

    /// Create `amount` new credits in `account`.
    fn mint(&mut self, account: &AccountId, amount: Credits) -> Result<(), LedgerError>;

    /// Move credits the sender owns directly.
    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError>;

    /// Move credits out of `owner` using the allowance granted to `spender`.
    fn transfer_from(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError>;

    /// Destroy credits held by `account` using the allowance granted to `spender`.
    fn burn_from(
        &mut self,
        spender: &AccountId,
        account: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError>;
}
