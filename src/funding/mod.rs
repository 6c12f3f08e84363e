//! Native-currency funding source.
//!
//! Credits are bought with native currency at a fixed ratio and can be
//! returned for a payout at the same ratio. The `FundingSource` trait is the
//! boundary the round controller talks to; `NativeVault` is the in-memory
//! implementation used by the service and tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{AccountId, LotteryError, NativeAmount};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FundingError {
    #[error("Insufficient native funds in {holder}: need {needed}, have {available}")]
    InsufficientFunds {
        holder: String,
        needed: NativeAmount,
        available: NativeAmount,
    },

    #[error("Native amount overflow")]
    Overflow,
}

impl From<FundingError> for LotteryError {
    fn from(e: FundingError) -> Self {
        match e {
            FundingError::InsufficientFunds { needed, available, .. } => {
                LotteryError::InsufficientBalance { needed, available }
            }
            FundingError::Overflow => LotteryError::Overflow("native amount".into()),
        }
    }
}

/// Abstraction over the native-currency side of the system.
pub trait FundingSource: Send {
    /// Receive `amount` from `payer` into the lottery's reserve.
    fn deposit(&mut self, payer: &AccountId, amount: NativeAmount) -> Result<(), FundingError>;

    /// Pay `amount` from the reserve to `recipient`.
    fn payout(&mut self, recipient: &AccountId, amount: NativeAmount) -> Result<(), FundingError>;

    /// Native currency currently held by the lottery.
    fn reserve(&self) -> NativeAmount;

    /// Native currency held by `account` outside the lottery.
    fn wallet_balance(&self, account: &AccountId) -> NativeAmount;
}

/// In-memory wallets plus the lottery reserve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeVault {
    reserve: NativeAmount,
    wallets: BTreeMap<AccountId, NativeAmount>,
}

impl NativeVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a wallet from outside the system (faucet).
    pub fn fund(&mut self, account: &AccountId, amount: NativeAmount) -> Result<(), FundingError> {
        let balance = self.wallet_balance(account);
        let updated = balance.checked_add(amount).ok_or(FundingError::Overflow)?;
        self.wallets.insert(account.clone(), updated);
        debug!(%account, amount, balance = updated, "Wallet funded");
        Ok(())
    }
}

impl FundingSource for NativeVault {
    fn deposit(&mut self, payer: &AccountId, amount: NativeAmount) -> Result<(), FundingError> {
        let available = self.wallet_balance(payer);
        if available < amount {
            return Err(FundingError::InsufficientFunds {
                holder: payer.to_string(),
                needed: amount,
                available,
            });
        }
        let reserve = self.reserve.checked_add(amount).ok_or(FundingError::Overflow)?;
        self.wallets.insert(payer.clone(), available - amount);
        self.reserve = reserve;
        debug!(%payer, amount, reserve, "Native deposit received");
        Ok(())
    }

    fn payout(&mut self, recipient: &AccountId, amount: NativeAmount) -> Result<(), FundingError> {
        if self.reserve < amount {
            return Err(FundingError::InsufficientFunds {
                holder: "reserve".to_string(),
                needed: amount,
                available: self.reserve,
            });
        }
        let balance = self
            .wallet_balance(recipient)
            .checked_add(amount)
            .ok_or(FundingError::Overflow)?;
        self.reserve -= amount;
        self.wallets.insert(recipient.clone(), balance);
        debug!(%recipient, amount, reserve = self.reserve, "Native payout sent");
        Ok(())
    }

    fn reserve(&self) -> NativeAmount {
        self.reserve
    }

    fn wallet_balance(&self, account: &AccountId) -> NativeAmount {
        self.wallets.get(account).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fund_and_deposit() {
        let payer = AccountId::from("alice");
        let mut vault = NativeVault::new();
        vault.fund(&payer, 300).unwrap();
        vault.deposit(&payer, 250).unwrap();
        assert_eq!(vault.wallet_balance(&payer), 50);
        assert_eq!(vault.reserve(), 250);
    }

    #[test]
    fn test_deposit_insufficient_wallet() {
        let payer = AccountId::from("alice");
        let mut vault = NativeVault::new();
        vault.fund(&payer, 10).unwrap();
        let err = vault.deposit(&payer, 11).unwrap_err();
        assert!(matches!(
            err,
            FundingError::InsufficientFunds { needed: 11, available: 10, .. }
        ));
        assert_eq!(vault.wallet_balance(&payer), 10);
        assert_eq!(vault.reserve(), 0);
    }

    #[test]
    fn test_payout_from_reserve() {
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        let mut vault = NativeVault::new();
        vault.fund(&alice, 500).unwrap();
        vault.deposit(&alice, 500).unwrap();
        vault.payout(&bob, 200).unwrap();
        assert_eq!(vault.reserve(), 300);
        assert_eq!(vault.wallet_balance(&bob), 200);
    }

    #[test]
    fn test_payout_exceeding_reserve_fails() {
        let mut vault = NativeVault::new();
        let err = vault.payout(&AccountId::from("bob"), 1).unwrap_err();
        assert!(format!("{err}").contains("reserve"));
        assert_eq!(vault.reserve(), 0);
    }

    #[test]
    fn test_fund_overflow() {
        let alice = AccountId::from("alice");
        let mut vault = NativeVault::new();
        vault.fund(&alice, NativeAmount::MAX).unwrap();
        assert_eq!(vault.fund(&alice, 1).unwrap_err(), FundingError::Overflow);
    }
}
