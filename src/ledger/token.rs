//! In-memory fungible credit.
//!
//! Balances and allowances live in ordered maps so snapshots serialise
//! deterministically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{CreditLedger, LedgerError};
use crate::types::{AccountId, Credits};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditToken {
    name: String,
    symbol: String,
    total_supply: Credits,
    balances: BTreeMap<AccountId, Credits>,
    /// owner -> spender -> remaining allowance
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Credits>>,
}

impl CreditToken {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    /// Number of accounts holding a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| **b > 0).count()
    }

    fn debit_balance(&mut self, account: &AccountId, amount: Credits) -> Result<(), LedgerError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        self.balances.insert(account.clone(), available - amount);
        Ok(())
    }

    fn credit_balance(&mut self, account: &AccountId, amount: Credits) -> Result<(), LedgerError> {
        let current = self.balance_of(account);
        let updated = current
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;
        self.balances.insert(account.clone(), updated);
        Ok(())
    }

    fn check_allowance(
        &self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Credits,
    ) -> Result<Credits, LedgerError> {
        let available = self.allowance(owner, spender);
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                needed: amount,
                available,
            });
        }
        Ok(available)
    }

    fn check_balance(&self, account: &AccountId, amount: Credits) -> Result<(), LedgerError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    fn set_allowance(&mut self, owner: &AccountId, spender: &AccountId, amount: Credits) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

    fn transfer_impl(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError> {
        self.check_balance(from, amount)?;
        if from != to {
            // Overflow is checked before debiting so a failure has no effect.
            self.balance_of(to)
                .checked_add(amount)
                .ok_or(LedgerError::SupplyOverflow)?;
            self.debit_balance(from, amount)?;
            self.credit_balance(to, amount)?;
        }
        Ok(())
    }
}

impl CreditLedger for CreditToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn total_supply(&self) -> Credits {
        self.total_supply
    }

    fn balance_of(&self, account: &AccountId) -> Credits {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Credits {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Credits) {
        self.set_allowance(owner, spender, amount);
        debug!(%owner, %spender, amount, "Allowance set");
    }

    fn mint(&mut self, account: &AccountId, amount: Credits) -> Result<(), LedgerError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;
        self.credit_balance(account, amount)?;
        self.total_supply = supply;
        debug!(%account, amount, supply, "Credits minted");
        Ok(())
    }

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError> {
        self.transfer_impl(from, to, amount)?;
        debug!(%from, %to, amount, "Credits transferred");
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError> {
        let allowance = self.check_allowance(owner, spender, amount)?;
        self.transfer_impl(owner, to, amount)?;
        self.set_allowance(owner, spender, allowance - amount);
        debug!(%spender, %owner, %to, amount, "Credits transferred via allowance");
        Ok(())
    }

    fn burn_from(
        &mut self,
        spender: &AccountId,
        account: &AccountId,
        amount: Credits,
    ) -> Result<(), LedgerError> {
        let allowance = self.check_allowance(account, spender, amount)?;
        self.debit_balance(account, amount)?;
        self.set_allowance(account, spender, allowance - amount);
        self.total_supply -= amount;
        debug!(%spender, %account, amount, supply = self.total_supply, "Credits burned");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
