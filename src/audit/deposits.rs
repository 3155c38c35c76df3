// Deposits - Candidacy deposits held by the stake handler
use super::ledger::LedgerError;
use crate::types::{AccountId, Balance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running nomination deposit per nominating account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NominationDeposits {
    deposits: BTreeMap<AccountId, Balance>,
}

impl NominationDeposits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a chain snapshot
    pub fn from_snapshot(
        entries: impl IntoIterator<Item = (AccountId, Balance)>,
    ) -> Result<Self, LedgerError> {
        let mut deposits = Self::new();
        for (account, amount) in entries {
            deposits.add(account, amount)?;
        }
        Ok(deposits)
    }

    /// Add to the account's deposit, returns the new total
    pub fn add(&mut self, account: AccountId, amount: Balance) -> Result<Balance, LedgerError> {
        let entry = self.deposits.entry(account).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(format!("nomination deposit of {}", account)))?;
        Ok(*entry)
    }

    /// Remove and return the account's deposit (0 if none)
    pub fn take(&mut self, account: &AccountId) -> Balance {
        self.deposits.remove(account).unwrap_or(0)
    }

    pub fn get(&self, account: &AccountId) -> Balance {
        self.deposits.get(account).copied().unwrap_or(0)
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.deposits.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }

    /// Sum of all deposits, `None` if it does not fit a balance
    pub fn total(&self) -> Option<Balance> {
        self.deposits
            .values()
            .try_fold(0 as Balance, |acc, v| acc.checked_add(*v))
    }
}
