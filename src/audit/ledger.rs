// Ledger - Pending balance flows within one scope (block or term)
// Principle: sums per account, so call order never matters

use crate::types::{AccountId, Balance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Balance of {account} would go negative: base {base} + deposits {deposits} < withdrawals {withdraws}")]
    Underflow {
        account: AccountId,
        base: Balance,
        deposits: Balance,
        withdraws: Balance,
    },

    #[error("Balance arithmetic overflowed: {0}")]
    Overflow(String),
}

fn checked_credit(
    entry: &mut Balance,
    amount: Balance,
    what: impl FnOnce() -> String,
) -> Result<(), LedgerError> {
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Overflow(what()))?;
    Ok(())
}

/// Running totals of collected fees and per-account pending flows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccumulator {
    total_fee: Balance,
    total_min_fee: Balance,
    deposits: BTreeMap<AccountId, Balance>,
    withdraws: BTreeMap<AccountId, Balance>,
}

impl LedgerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a paid fee and the minimum fee its transaction kind requires
    pub fn collect(&mut self, fee: Balance, min_fee: Balance) -> Result<(), LedgerError> {
        checked_credit(&mut self.total_fee, fee, || "total fee".into())?;
        checked_credit(&mut self.total_min_fee, min_fee, || "total minimum fee".into())
    }

    pub fn deposit(&mut self, account: AccountId, amount: Balance) -> Result<(), LedgerError> {
        let entry = self.deposits.entry(account).or_insert(0);
        checked_credit(entry, amount, || format!("deposits to {}", account))
    }

    pub fn withdraw(&mut self, account: AccountId, amount: Balance) -> Result<(), LedgerError> {
        let entry = self.withdraws.entry(account).or_insert(0);
        checked_credit(entry, amount, || format!("withdrawals from {}", account))
    }

    pub fn total_fee(&self) -> Balance {
        self.total_fee
    }

    pub fn total_min_fee(&self) -> Balance {
        self.total_min_fee
    }

    pub fn deposited(&self, account: &AccountId) -> Balance {
        self.deposits.get(account).copied().unwrap_or(0)
    }

    pub fn withdrawn(&self, account: &AccountId) -> Balance {
        self.withdraws.get(account).copied().unwrap_or(0)
    }

    /// `base + deposits - withdrawals` for the account
    pub fn adjust(&self, account: &AccountId, base: Balance) -> Result<Balance, LedgerError> {
        let deposits = self.deposited(account);
        let withdraws = self.withdrawn(account);
        base.checked_add(deposits)
            .and_then(|credited| credited.checked_sub(withdraws))
            .ok_or(LedgerError::Underflow {
                account: *account,
                base,
                deposits,
                withdraws,
            })
    }

    /// Fold another scope's flows and totals into this one
    pub fn merge(&mut self, other: &LedgerAccumulator) -> Result<(), LedgerError> {
        self.collect(other.total_fee, other.total_min_fee)?;
        for (account, amount) in &other.deposits {
            self.deposit(*account, *amount)?;
        }
        for (account, amount) in &other.withdraws {
            self.withdraw(*account, *amount)?;
        }
        Ok(())
    }

    /// Every account with a pending deposit or withdrawal
    pub fn accounts(&self) -> BTreeSet<AccountId> {
        self.deposits
            .keys()
            .chain(self.withdraws.keys())
            .copied()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.total_fee == 0
            && self.total_min_fee == 0
            && self.deposits.is_empty()
            && self.withdraws.is_empty()
    }
}
